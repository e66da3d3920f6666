//! Strip geometry and color types shared by every link backend

use crate::error::LinkError;

/// Number of addressable LEDs on the strip.
pub const LED_COUNT: usize = 14;

/// Wire value that addresses every LED at once.
pub const ALL_LEDS: u8 = 255;

/// RGB color tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const RED: Self = Self { r: 255, g: 0, b: 0 };
    pub const GREEN: Self = Self { r: 0, g: 255, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale brightness by a factor in [0, 1].
    pub fn scale(self, factor: f32) -> Self {
        let f = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        Self {
            r: (self.r as f32 * f) as u8,
            g: (self.g as f32 * f) as u8,
            b: (self.b as f32 * f) as u8,
        }
    }

    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}

/// Target of a pixel write: one LED or the whole strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedIndex {
    Pixel(u8),
    All,
}

impl LedIndex {
    /// Validate a strip position.
    pub fn pixel(index: usize) -> Result<Self, LinkError> {
        if index < LED_COUNT {
            Ok(LedIndex::Pixel(index as u8))
        } else {
            Err(LinkError::InvalidIndex(index))
        }
    }

    /// Value written to the select register.
    pub fn wire(self) -> u8 {
        match self {
            LedIndex::Pixel(i) => i,
            LedIndex::All => ALL_LEDS,
        }
    }
}

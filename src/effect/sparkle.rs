//! `random_sparkle`: pixels ignite at random and decay away.
//!
//! Ignition chance grows with load and chaos; the hue band moves from cool
//! blues at idle through warm yellows to red and magenta under heavy load.

use lightbar_link::{Rgb, LED_COUNT};
use rand::Rng;

use super::{unit, Frame, Metrics};
use crate::color::hsv_to_rgb;

/// Per-frame brightness decay
pub const DECAY: f32 = 0.85;

/// Pixels at or below this level render off
const VISIBLE_THRESHOLD: f32 = 0.01;

/// Chance that a pixel ignites this frame: 5% at idle to 35% at full load,
/// times chaos, capped at 1.
pub fn ignition_probability(load: f32, chaos: f32) -> f32 {
    ((0.05 + unit(load) * 0.3) * chaos).clamp(0.0, 1.0)
}

/// Draw a sparkle hue in degrees from the band for this load.
pub fn sparkle_hue<R: Rng + ?Sized>(load: f32, rng: &mut R) -> f32 {
    let load = unit(load);
    if load < 0.4 {
        // blue, cyan
        rng.random_range(180.0f32..=238.0)
    } else if load < 0.7 {
        // yellow, orange
        rng.random_range(29.0f32..=61.0)
    } else if rng.random_bool(0.5) {
        // red
        rng.random_range(0.0f32..=29.0)
    } else {
        // magenta
        rng.random_range(288.0f32..360.0)
    }
}

#[derive(Debug, Clone)]
pub struct Sparkle {
    levels: [f32; LED_COUNT],
    colors: [Rgb; LED_COUNT],
}

impl Default for Sparkle {
    fn default() -> Self {
        Self::new()
    }
}

impl Sparkle {
    pub fn new() -> Self {
        Self {
            levels: [0.0; LED_COUNT],
            colors: [Rgb::BLACK; LED_COUNT],
        }
    }

    /// Current brightness level of each pixel
    pub fn levels(&self) -> &[f32; LED_COUNT] {
        &self.levels
    }

    pub fn frame_at<R: Rng + ?Sized>(
        &mut self,
        _elapsed: f64,
        metrics: Metrics,
        chaos: f32,
        rng: &mut R,
    ) -> Frame {
        let load = unit(metrics.primary());
        let chance = f64::from(ignition_probability(load, chaos));

        for level in self.levels.iter_mut() {
            *level *= DECAY;
        }

        for i in 0..LED_COUNT {
            if rng.random_bool(chance) {
                self.levels[i] = 1.0;
                self.colors[i] = hsv_to_rgb(sparkle_hue(load, rng), 1.0, 1.0);
            }
        }

        let mut pixels = [Rgb::BLACK; LED_COUNT];
        for (i, px) in pixels.iter_mut().enumerate() {
            if self.levels[i] > VISIBLE_THRESHOLD {
                *px = self.colors[i].scale(self.levels[i]);
            }
        }
        Frame::Pixels(pixels)
    }
}

//! Link abstraction for the 14-LED light bar
//!
//! This crate provides a unified interface for pushing colors to the strip
//! across different backends:
//!
//! - Register link over Linux i2c-dev (the real controller)
//! - In-memory link (dry runs, tests)
//!
//! Backends only do raw writes. `RetryLink` adds bounded retries on top.

pub mod error;
pub mod memory;
pub mod register;
pub mod retry;
pub mod types;

pub use error::LinkError;
pub use memory::MemoryLink;
pub use register::{open_i2c, I2cBus, RegisterBus, RegisterLink, DEFAULT_ADDRESS, DEFAULT_BUS};
pub use retry::{RetryLink, RetryPolicy};
pub use types::{LedIndex, Rgb, ALL_LEDS, LED_COUNT};

/// The core link trait - all backends implement this
pub trait LedLink {
    /// Set one pixel, or every pixel with `LedIndex::All`
    fn set_pixel(&mut self, index: LedIndex, color: Rgb) -> Result<(), LinkError>;

    /// Set every pixel to the same color
    fn set_all(&mut self, color: Rgb) -> Result<(), LinkError> {
        self.set_pixel(LedIndex::All, color)
    }

    /// Turn every pixel off
    fn clear(&mut self) -> Result<(), LinkError>;

    /// Release the underlying bus. Further writes fail with `LinkError::Closed`.
    fn close(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

impl<L: LedLink + ?Sized> LedLink for Box<L> {
    fn set_pixel(&mut self, index: LedIndex, color: Rgb) -> Result<(), LinkError> {
        (**self).set_pixel(index, color)
    }

    fn set_all(&mut self, color: Rgb) -> Result<(), LinkError> {
        (**self).set_all(color)
    }

    fn clear(&mut self) -> Result<(), LinkError> {
        (**self).clear()
    }

    fn close(&mut self) -> Result<(), LinkError> {
        (**self).close()
    }
}

/// Type-erased link, as owned by the controller
pub type BoxedLink = Box<dyn LedLink + Send>;

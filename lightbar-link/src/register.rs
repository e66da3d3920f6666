//! Register protocol of the light bar controller
//!
//! The controller sits on an I2C bus and exposes one byte-wide register per
//! color channel. A pixel write is four register writes:
//!
//! ```text
//! [0x00 select] = led index (0-13) or 255 for all
//! [0x01 red]    = 0-255
//! [0x02 green]  = 0-255
//! [0x03 blue]   = 0-255
//! ```
//!
//! Writing anything to `0x07` turns every LED off.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::LinkError;
use crate::types::{LedIndex, Rgb};
use crate::LedLink;

/// Register addresses
pub mod reg {
    pub const LED_SELECT: u8 = 0x00;
    pub const RED: u8 = 0x01;
    pub const GREEN: u8 = 0x02;
    pub const BLUE: u8 = 0x03;
    pub const OFF: u8 = 0x07;
}

/// Bus timing constants
pub mod timing {
    /// Settle time after each register write (ms)
    pub const WRITE_DELAY_MS: u64 = 25;
    /// Settle time after a complete command (ms)
    pub const COMMAND_DELAY_MS: u64 = 30;
}

pub const DEFAULT_BUS: u8 = 7;
pub const DEFAULT_ADDRESS: u16 = 0x0E;

/// Anything that can write a single byte register on the controller.
pub trait RegisterBus {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), LinkError>;
}

/// `LedLink` implementation speaking the register protocol over any bus.
pub struct RegisterLink<B: RegisterBus> {
    bus: Option<B>,
    write_delay: Duration,
    command_delay: Duration,
}

impl<B: RegisterBus> RegisterLink<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus: Some(bus),
            write_delay: Duration::from_millis(timing::WRITE_DELAY_MS),
            command_delay: Duration::from_millis(timing::COMMAND_DELAY_MS),
        }
    }

    /// Override bus settle times (zero for tests and fast buses)
    pub fn with_delays(mut self, write_delay: Duration, command_delay: Duration) -> Self {
        self.write_delay = write_delay;
        self.command_delay = command_delay;
        self
    }

    /// Access the underlying bus, if the link is still open.
    pub fn bus(&self) -> Option<&B> {
        self.bus.as_ref()
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), LinkError> {
        let bus = self.bus.as_mut().ok_or(LinkError::Closed)?;
        bus.write_register(register, value)?;
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        Ok(())
    }

    fn settle(&self) {
        if !self.command_delay.is_zero() {
            std::thread::sleep(self.command_delay);
        }
    }
}

impl<B: RegisterBus> LedLink for RegisterLink<B> {
    fn set_pixel(&mut self, index: LedIndex, color: Rgb) -> Result<(), LinkError> {
        self.write(reg::LED_SELECT, index.wire())?;
        self.write(reg::RED, color.r)?;
        self.write(reg::GREEN, color.g)?;
        self.write(reg::BLUE, color.b)?;
        self.settle();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), LinkError> {
        self.write(reg::OFF, 0)?;
        self.settle();
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        if self.bus.take().is_some() {
            debug!("Register link closed");
        }
        Ok(())
    }
}

// ============================================================================
// Linux i2c-dev bus
// ============================================================================

/// `I2C_SLAVE` ioctl request from `<linux/i2c-dev.h>`
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Register bus on a Linux `/dev/i2c-N` character device.
pub struct I2cBus {
    file: File,
    path: PathBuf,
    address: u16,
}

impl I2cBus {
    /// Open `/dev/i2c-{bus}` and bind it to the controller address.
    pub fn open(bus: u8, address: u16) -> Result<Self, LinkError> {
        let path = PathBuf::from(format!("/dev/i2c-{bus}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    LinkError::BusUnavailable(format!("{}: {e}", path.display()))
                }
                _ => LinkError::from(e),
            })?;

        // SAFETY: `file` owns a valid descriptor for the duration of the call and
        // I2C_SLAVE takes the 7-bit address by value.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            return Err(LinkError::BusUnavailable(format!(
                "{}: bind address 0x{address:02X}: {}",
                path.display(),
                std::io::Error::last_os_error()
            )));
        }

        debug!(path = %path.display(), address, "Opened i2c bus");
        Ok(Self {
            file,
            path,
            address,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn address(&self) -> u16 {
        self.address
    }
}

impl RegisterBus for I2cBus {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), LinkError> {
        self.file.write_all(&[register, value])?;
        Ok(())
    }
}

/// Open the strip on a Linux i2c bus.
pub fn open_i2c(bus: u8, address: u16) -> Result<RegisterLink<I2cBus>, LinkError> {
    Ok(RegisterLink::new(I2cBus::open(bus, address)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBus {
        writes: Vec<(u8, u8)>,
    }

    impl RegisterBus for RecordingBus {
        fn write_register(&mut self, register: u8, value: u8) -> Result<(), LinkError> {
            self.writes.push((register, value));
            Ok(())
        }
    }

    fn link() -> RegisterLink<RecordingBus> {
        RegisterLink::new(RecordingBus::default()).with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_set_pixel_register_sequence() {
        let mut link = link();
        link.set_pixel(LedIndex::Pixel(3), Rgb::new(10, 20, 30))
            .unwrap();
        assert_eq!(
            link.bus().unwrap().writes,
            vec![
                (reg::LED_SELECT, 3),
                (reg::RED, 10),
                (reg::GREEN, 20),
                (reg::BLUE, 30)
            ]
        );
    }

    #[test]
    fn test_set_all_uses_sentinel() {
        let mut link = link();
        link.set_all(Rgb::GREEN).unwrap();
        assert_eq!(link.bus().unwrap().writes[0], (reg::LED_SELECT, 255));
    }

    #[test]
    fn test_clear_writes_off_register() {
        let mut link = link();
        link.clear().unwrap();
        assert_eq!(link.bus().unwrap().writes, vec![(reg::OFF, 0)]);
    }

    #[test]
    fn test_closed_link_rejects_writes() {
        let mut link = link();
        link.close().unwrap();
        assert!(matches!(link.clear(), Err(LinkError::Closed)));
        // Closing twice is fine
        link.close().unwrap();
    }

    #[test]
    fn test_missing_bus_is_unavailable() {
        // No machine has 250 i2c adapters
        match I2cBus::open(250, DEFAULT_ADDRESS) {
            Err(LinkError::BusUnavailable(msg)) => assert!(msg.contains("/dev/i2c-250")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bus 250 should not exist"),
        }
    }
}

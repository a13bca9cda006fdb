//! I2C bus to the tuner.
//!
//! [`I2cBus`] implements the [`Bus`] trait over an `embedded-hal` I2C
//! peripheral and an output pin wired to the chip's active-low reset input.
//! Transfers are blocking; at 400 kHz a full 16-byte response takes well
//! under a millisecond, which is shorter than the driver's poll interval.

use async_trait::async_trait;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{Error as _, I2c};
use tracing::trace;

use webradio_core::bus::Bus;
use webradio_core::error::{Error, Result};

/// Si4730 address with SEN tied low.
pub const DEFAULT_ADDRESS: u8 = 0x63;

/// Tuner bus over I2C.
#[derive(Debug)]
pub struct I2cBus<I, P> {
    i2c: I,
    reset: P,
    address: u8,
}

impl<I, P> I2cBus<I, P>
where
    I: I2c,
    P: OutputPin,
{
    /// Wrap a peripheral and reset pin, addressing [`DEFAULT_ADDRESS`].
    pub fn new(i2c: I, reset: P) -> Self {
        Self::with_address(i2c, reset, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I, reset: P, address: u8) -> Self {
        I2cBus {
            i2c,
            reset,
            address,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give back the peripheral and pin.
    pub fn release(self) -> (I, P) {
        (self.i2c, self.reset)
    }
}

#[async_trait]
impl<I, P> Bus for I2cBus<I, P>
where
    I: I2c + Send,
    P: OutputPin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!(addr = self.address, ?data, "i2c write");
        self.i2c
            .write(self.address, data)
            .map_err(|e| Error::Bus(format!("i2c write: {:?}", e.kind())))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.i2c
            .read(self.address, buf)
            .map_err(|e| Error::Bus(format!("i2c read: {:?}", e.kind())))
    }

    async fn set_reset(&mut self, high: bool) -> Result<()> {
        let result = if high {
            self.reset.set_high()
        } else {
            self.reset.set_low()
        };
        result.map_err(|e| Error::Bus(format!("reset pin: {e:?}")))
    }
}

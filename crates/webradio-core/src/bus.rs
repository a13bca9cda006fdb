//! Bus trait for tuner communication.
//!
//! The [`Bus`] trait abstracts over the physical command bus to the tuner
//! chip and its reset line. The driver in `webradio-si4730` operates on a
//! `Bus` rather than directly on an I2C peripheral, so the same protocol
//! engine runs against real hardware (`webradio-transport`) and against
//! `MockBus` / `SimulatedTuner` from `webradio-test-harness`.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous byte-level bus to the tuner.
///
/// Every transfer is a complete bus transaction: a write is one
/// start..stop sequence carrying the whole frame, a read fills the whole
/// buffer. Framing and status interpretation belong to the driver.
#[async_trait]
pub trait Bus: Send {
    /// Write one command frame in a single transaction.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes in a single transaction.
    async fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Drive the reset line. `false` holds the chip in reset.
    async fn set_reset(&mut self, high: bool) -> Result<()>;
}

#[async_trait]
impl<B: Bus + ?Sized> Bus for Box<B> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf).await
    }

    async fn set_reset(&mut self, high: bool) -> Result<()> {
        (**self).set_reset(high).await
    }
}

//! Bus implementations for the web radio.
//!
//! This crate provides concrete implementations of the
//! [`Bus`](webradio_core::Bus) trait from `webradio-core`:
//!
//! - [`I2cBus`]: any `embedded-hal` I2C peripheral plus a reset pin, the
//!   way the tuner is wired on the board
//!
//! # Example
//!
//! ```ignore
//! use webradio_transport::I2cBus;
//!
//! let bus = I2cBus::new(i2c, reset_pin); // default address 0x63
//! let radio = webradio_si4730::Si4730Builder::new().build(bus).await?;
//! ```

pub mod i2c;

pub use i2c::{DEFAULT_ADDRESS, I2cBus};

//! webradio-core: Core traits, types, and error definitions for the web
//! radio appliance.
//!
//! The tuner driver, the audio buffer pool, and the HTTP servers all build
//! on the abstractions defined here, so each of them can be tested against
//! mocks without pulling in the others.
//!
//! # Key types
//!
//! - [`Bus`] -- byte-level command bus to the tuner chip
//! - [`AudioBufferSource`] / [`StreamSlot`] -- per-client audio slots
//! - [`Band`] -- the AM/FM band selector
//! - [`Error`] / [`Result`] -- error handling

pub mod audio;
pub mod band;
pub mod bus;
pub mod error;
pub mod helpers;
pub mod types;

pub use audio::{AudioBufferSource, SlotId, StreamSlot};
pub use band::{Band, ParseBandError};
pub use bus::Bus;
pub use error::{Error, Result};
pub use helpers::{format_fm_mhz, station_name};
pub use types::*;

//! webradio-si4730: Driver for the Silicon Labs Si4730 AM/FM receiver.
//!
//! The chip is controlled through a command/response protocol over a
//! [`Bus`](webradio_core::Bus): every command waits for clear-to-send, is
//! written as one frame, and is answered with a 16-byte response whose
//! first byte is the status register.
//!
//! # Layers
//!
//! - [`commands`] -- opcodes, property ids, frame builders and parsers (pure)
//! - [`config`] -- band configuration tables applied on band changes
//! - [`driver`] -- [`Si4730`], the stateful protocol engine
//! - [`io`] -- the worker task that owns the driver, and [`RadioHandle`]
//! - [`builder`] -- [`Si4730Builder`]

pub mod builder;
pub mod commands;
pub mod config;
pub mod driver;
pub mod io;

pub use builder::Si4730Builder;
pub use commands::{CommandFrame, ResponseFrame};
pub use config::{BandConfig, BandOptions, Deemphasis};
pub use driver::{MIN_RESET_PULSE, Si4730, Timing};
pub use io::{RadioHandle, RadioTask, spawn_radio_task};

//! webradio-test-harness: Test utilities for the web radio.
//!
//! This crate provides [`MockBus`] for byte-exact testing of the tuner
//! driver against scripted request/response pairs, and [`SimulatedTuner`],
//! a stateful model of the Si4730 that answers the command set the driver
//! uses (power, properties, tune, seek, status) against a table of stations.
//!
//! Both types are cheap handles over shared state, so a test keeps a clone
//! to inspect traffic after the bus has moved into the driver.

pub mod mock_bus;
pub mod simulated;

pub use mock_bus::MockBus;
pub use simulated::{SimStation, SimulatedTuner};

//! Si4730Builder -- fluent builder for constructing [`Si4730`] instances.
//!
//! Separates configuration from construction so that callers can adjust
//! poll budgets and band tables before the chip is reset.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use webradio_si4730::Si4730Builder;
//! use webradio_test_harness::SimulatedTuner;
//!
//! # async fn example() -> webradio_core::Result<()> {
//! let radio = Si4730Builder::new()
//!     .cts_polls(500)
//!     .stc_poll_interval(Duration::from_millis(2))
//!     .build(SimulatedTuner::demo())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use webradio_core::{Bus, Result};

use crate::config::BandConfig;
use crate::driver::{MIN_RESET_PULSE, Si4730, Timing};

/// Fluent builder for [`Si4730`].
///
/// Defaults: 1 ms CTS polls with a budget of 1000, 1 ms STC polls with a
/// budget of 60000, a 10 ms reset pulse, ITU region 2 band tables.
pub struct Si4730Builder {
    timing: Timing,
    fm: BandConfig,
    am: BandConfig,
}

impl Si4730Builder {
    pub fn new() -> Self {
        Si4730Builder {
            timing: Timing::default(),
            fm: BandConfig::fm_itu2(),
            am: BandConfig::am_itu2(),
        }
    }

    pub fn cts_poll_interval(mut self, interval: Duration) -> Self {
        self.timing.cts_poll_interval = interval;
        self
    }

    pub fn cts_polls(mut self, polls: u32) -> Self {
        self.timing.cts_polls = polls;
        self
    }

    pub fn stc_poll_interval(mut self, interval: Duration) -> Self {
        self.timing.stc_poll_interval = interval;
        self
    }

    pub fn stc_polls(mut self, polls: u32) -> Self {
        self.timing.stc_polls = polls;
        self
    }

    /// Reset pulse width, raised to [`MIN_RESET_PULSE`] if shorter.
    pub fn reset_pulse(mut self, pulse: Duration) -> Self {
        self.timing.reset_pulse = pulse.max(MIN_RESET_PULSE);
        self
    }

    /// Replace the FM configuration table.
    pub fn fm_config(mut self, config: BandConfig) -> Self {
        self.fm = config;
        self
    }

    /// Replace the AM configuration table.
    pub fn am_config(mut self, config: BandConfig) -> Self {
        self.am = config;
        self
    }

    /// Build the driver without touching the chip.
    pub fn build_idle(self, bus: impl Bus + 'static) -> Result<Si4730> {
        Si4730::new(Box::new(bus), self.timing, self.fm, self.am)
    }

    /// Build the driver and reset the chip into FM.
    pub async fn build(self, bus: impl Bus + 'static) -> Result<Si4730> {
        let mut radio = self.build_idle(bus)?;
        radio.reset().await?;
        Ok(radio)
    }
}

impl Default for Si4730Builder {
    fn default() -> Self {
        Self::new()
    }
}

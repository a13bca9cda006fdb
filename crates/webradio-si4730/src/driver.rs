//! The Si4730 protocol engine.
//!
//! [`Si4730`] exclusively owns the bus to the chip and the driver-side tuner
//! state: the band last fully configured, the last successful tune, and the
//! per-band channel lists built by scans. Every public operation is one or
//! more complete command transactions; nothing else touches the bus.
//!
//! # Transactions
//!
//! Each command waits for clear-to-send by polling the one-byte status
//! register, writes opcode and arguments in a single bus write, then reads
//! the 16-byte response. Tunes and seeks additionally poll GET_INT_STATUS
//! until the seek/tune-complete interrupt is raised.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use webradio_core::{Band, Bus, Error, RadioStatus, Result, TuneStatus};

use crate::commands::*;
use crate::config::BandConfig;

/// Shortest reset pulse the chip accepts.
pub const MIN_RESET_PULSE: Duration = Duration::from_micros(100);

/// Poll budgets and delays for bus transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub cts_poll_interval: Duration,
    /// Extra status polls before a command times out.
    pub cts_polls: u32,
    pub stc_poll_interval: Duration,
    /// GET_INT_STATUS polls before a tune or seek times out.
    pub stc_polls: u32,
    /// How long the reset line is held low; never less than
    /// [`MIN_RESET_PULSE`].
    pub reset_pulse: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            cts_poll_interval: Duration::from_millis(1),
            cts_polls: 1000,
            stc_poll_interval: Duration::from_millis(1),
            stc_polls: 60_000,
            reset_pulse: Duration::from_millis(10),
        }
    }
}

/// Driver for one Si4730 AM/FM receiver.
pub struct Si4730 {
    bus: Box<dyn Bus>,
    timing: Timing,
    fm: BandConfig,
    am: BandConfig,
    band: Option<Band>,
    tuned: Option<(Band, u16)>,
    fm_channels: Vec<u16>,
    am_channels: Vec<u16>,
}

impl Si4730 {
    /// Wrap a bus without touching the chip. Call [`reset`](Self::reset)
    /// before anything else.
    pub fn new(bus: Box<dyn Bus>, timing: Timing, fm: BandConfig, am: BandConfig) -> Result<Self> {
        for (band, cfg) in [(Band::Fm, &fm), (Band::Am, &am)] {
            cfg.validate()?;
            if cfg.band != band {
                return Err(Error::InvalidBand(format!(
                    "{} table supplied for {band}",
                    cfg.band
                )));
            }
        }
        Ok(Si4730 {
            bus,
            timing,
            fm,
            am,
            band: None,
            tuned: None,
            fm_channels: Vec::new(),
            am_channels: Vec::new(),
        })
    }

    // -----------------------------------------------------------------
    // State
    // -----------------------------------------------------------------

    /// Band last fully configured, `None` before reset or after a failed
    /// band change.
    pub fn band(&self) -> Option<Band> {
        self.band
    }

    /// Last successful tune.
    pub fn frequency(&self) -> Option<(Band, u16)> {
        self.tuned
    }

    /// Stations found by the last scan of `band`, in seek order.
    pub fn channels(&self, band: Band) -> &[u16] {
        match band {
            Band::Fm => &self.fm_channels,
            Band::Am => &self.am_channels,
        }
    }

    fn channels_mut(&mut self, band: Band) -> &mut Vec<u16> {
        match band {
            Band::Fm => &mut self.fm_channels,
            Band::Am => &mut self.am_channels,
        }
    }

    pub fn band_config(&self, band: Band) -> &BandConfig {
        match band {
            Band::Fm => &self.fm,
            Band::Am => &self.am,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn status(&self) -> RadioStatus {
        RadioStatus {
            band: self.band,
            tuned: self.tuned,
            fm_channels: self.fm_channels.clone(),
            am_channels: self.am_channels.clone(),
        }
    }

    // -----------------------------------------------------------------
    // Bus transactions
    // -----------------------------------------------------------------

    async fn read_status(&mut self) -> Result<u8> {
        let mut status = [0u8; 1];
        self.bus.read(&mut status).await?;
        Ok(status[0])
    }

    async fn wait_cts(&mut self) -> Result<()> {
        let mut polls = 0;
        loop {
            if self.read_status().await? & STATUS_CTS != 0 {
                return Ok(());
            }
            if polls >= self.timing.cts_polls {
                warn!(polls, "tuner never raised CTS");
                return Err(Error::CommandTimeout);
            }
            polls += 1;
            sleep(self.timing.cts_poll_interval).await;
        }
    }

    async fn wait_stc(&mut self) -> Result<()> {
        for _ in 0..self.timing.stc_polls {
            if self.send_command(&cmd_get_int_status()).await?.stc() {
                return Ok(());
            }
            sleep(self.timing.stc_poll_interval).await;
        }
        warn!(polls = self.timing.stc_polls, "tuner never raised STC");
        Err(Error::SeekTimeout)
    }

    /// Run one command transaction and return its response.
    pub async fn send_command(&mut self, frame: &CommandFrame) -> Result<ResponseFrame> {
        self.wait_cts().await?;
        self.bus.write(&frame.encode()).await?;

        let mut buf = [0u8; RESPONSE_LEN];
        self.bus.read(&mut buf).await?;
        let resp = ResponseFrame::new(buf);
        debug!(
            opcode = frame.opcode(),
            args = ?frame.args(),
            status = resp.status(),
            "tuner command"
        );
        if resp.err() {
            return Err(Error::DeviceError {
                opcode: frame.opcode(),
                status: resp.status(),
            });
        }
        Ok(resp)
    }

    pub async fn get_property(&mut self, id: u16) -> Result<u16> {
        Ok(self
            .send_command(&cmd_get_property(id))
            .await?
            .property_value())
    }

    pub async fn set_property(&mut self, id: u16, value: u16) -> Result<()> {
        self.send_command(&cmd_set_property(id, value)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Pulse the reset line and bring the chip up in FM.
    ///
    /// Channel lists and the last tune are cleared. Fails with
    /// [`Error::HardwareFault`] if the chip still reports an error once it
    /// is configured.
    pub async fn reset(&mut self) -> Result<()> {
        info!("resetting tuner");
        self.band = None;
        self.tuned = None;
        self.fm_channels.clear();
        self.am_channels.clear();

        self.bus.set_reset(false).await?;
        sleep(self.timing.reset_pulse.max(MIN_RESET_PULSE)).await;
        self.bus.set_reset(true).await?;

        self.send_command(&cmd_power_down()).await?;
        self.set_band(Band::Fm).await?;

        let status = self.read_status().await?;
        if status & STATUS_ERR != 0 {
            self.band = None;
            return Err(Error::HardwareFault(format!(
                "status 0x{status:02X} after reset"
            )));
        }
        Ok(())
    }

    /// Power-cycle into `band` and apply its configuration table.
    ///
    /// A no-op when `band` is already configured. The band marker is only
    /// set once every step has succeeded.
    pub async fn set_band(&mut self, band: Band) -> Result<()> {
        if self.band == Some(band) {
            return Ok(());
        }
        self.band = None;
        self.tuned = None;

        self.send_command(&cmd_power_down()).await?;
        self.send_command(&cmd_power_up(band)).await?;
        let writes = self.band_config(band).property_writes();
        for (id, value) in writes {
            self.set_property(id, value).await?;
        }
        self.set_property(RX_VOLUME, RX_VOLUME_MAX).await?;
        self.set_property(RX_HARD_MUTE, 0).await?;

        self.band = Some(band);
        info!(%band, "band configured");
        Ok(())
    }

    /// Sweep `band` upward and rebuild its channel list.
    ///
    /// The band is always reconfigured first, since the chip may have been
    /// left mid-band by an earlier tune. Only channels reported valid are
    /// kept. The sweep ends at the band limit, or after
    /// [`BandConfig::max_seek_steps`] seeks.
    pub async fn scan(&mut self, band: Band) -> Result<Vec<u16>> {
        self.band = None;
        self.set_band(band).await?;
        self.channels_mut(band).clear();

        let budget = self.band_config(band).max_seek_steps();
        for _ in 0..budget {
            self.send_command(&cmd_seek_up(band)).await?;
            self.wait_stc().await?;
            let status = self
                .send_command(&cmd_tune_status(band))
                .await?
                .tune_status();

            if status.valid {
                debug!(%band, freq = status.freq, rssi = status.rssi, "station found");
                self.channels_mut(band).push(status.freq);
            }
            if status.band_limit {
                info!(%band, found = self.channels(band).len(), "scan complete");
                return Ok(self.channels(band).to_vec());
            }
        }

        warn!(%band, budget, "seek never reached the band limit, stopping scan");
        Ok(self.channels(band).to_vec())
    }

    /// Tune to `freq` on `band`.
    ///
    /// The frequency is checked against the band's seek limits before the
    /// band is selected, so a rejected tune leaves the chip untouched.
    pub async fn tune(&mut self, band: Band, freq: u32) -> Result<TuneStatus> {
        let freq = self.band_config(band).check_frequency(freq)?;
        self.set_band(band).await?;

        self.send_command(&cmd_tune_freq(band, freq)).await?;
        self.wait_stc().await?;
        let status = self
            .send_command(&cmd_tune_status(band))
            .await?
            .tune_status();

        self.tuned = Some((band, freq));
        info!(%band, freq, valid = status.valid, rssi = status.rssi, snr = status.snr, "tuned");
        Ok(status.into())
    }
}

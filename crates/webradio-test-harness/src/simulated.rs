//! A stateful Si4730 model.
//!
//! [`SimulatedTuner`] answers the subset of the Si473x command set that the
//! driver uses. It tracks power state, receive function, the property store,
//! the current frequency and the seek/tune-complete interrupt, and resolves
//! tunes and seeks against a per-band table of [`SimStation`]s.
//!
//! Seeks go upward from the current frequency to the next station inside
//! the configured seek band. When no station remains the chip parks on the
//! band top and reports BLTF, which is what ends a scan.
//!
//! Fault switches make the chip stop raising CTS, stop raising STCINT,
//! report the global error bit, or wrap seeks forever so that timeout and
//! step-budget paths can be exercised.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::trace;

use webradio_core::band::Band;
use webradio_core::bus::Bus;
use webradio_core::error::{Error, Result};

const STATUS_CTS: u8 = 0x80;
const STATUS_ERR: u8 = 0x40;
const STATUS_STCINT: u8 = 0x01;

const POWER_UP: u8 = 0x01;
const POWER_DOWN: u8 = 0x11;
const SET_PROPERTY: u8 = 0x12;
const GET_PROPERTY: u8 = 0x13;
const GET_INT_STATUS: u8 = 0x14;
const FM_TUNE_FREQ: u8 = 0x20;
const FM_SEEK_START: u8 = 0x21;
const FM_TUNE_STATUS: u8 = 0x22;
const AM_TUNE_FREQ: u8 = 0x40;
const AM_SEEK_START: u8 = 0x41;
const AM_TUNE_STATUS: u8 = 0x42;

const FM_SEEK_BAND_BOTTOM: u16 = 0x1400;
const FM_SEEK_BAND_TOP: u16 = 0x1401;
const AM_SEEK_BAND_BOTTOM: u16 = 0x3400;
const AM_SEEK_BAND_TOP: u16 = 0x3401;

/// A station the simulated chip can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimStation {
    pub freq: u16,
    pub rssi: u8,
    pub snr: u8,
    /// Whether tune status reports the channel as valid. A seek still
    /// stops on invalid stations.
    pub valid: bool,
}

#[derive(Debug, Default)]
struct Faults {
    never_cts: bool,
    never_stc: bool,
    status_err: bool,
    wrap_seek: bool,
}

#[derive(Debug, Default)]
struct Chip {
    in_reset: bool,
    function: Option<Band>,
    properties: HashMap<u16, u16>,
    freq: u16,
    stc: bool,
    band_limit: bool,
    pending: Option<[u8; 16]>,
    stations: HashMap<Band, Vec<SimStation>>,
    faults: Faults,
    commands: Vec<Vec<u8>>,
    reset_pulses: usize,
    status_reads: usize,
}

impl Chip {
    fn seek_range(&self, band: Band) -> (u16, u16) {
        let (bottom_id, top_id, bottom, top) = match band {
            Band::Fm => (FM_SEEK_BAND_BOTTOM, FM_SEEK_BAND_TOP, 8750, 10790),
            Band::Am => (AM_SEEK_BAND_BOTTOM, AM_SEEK_BAND_TOP, 520, 1710),
        };
        (
            self.properties.get(&bottom_id).copied().unwrap_or(bottom),
            self.properties.get(&top_id).copied().unwrap_or(top),
        )
    }

    fn station(&self, band: Band, freq: u16) -> Option<SimStation> {
        self.stations
            .get(&band)
            .and_then(|list| list.iter().find(|s| s.freq == freq).copied())
    }

    fn complete(&mut self) {
        if !self.faults.never_stc {
            self.stc = true;
        }
    }

    fn seek_up(&mut self, band: Band) {
        let (bottom, top) = self.seek_range(band);
        let next = self.stations.get(&band).and_then(|list| {
            list.iter()
                .map(|s| s.freq)
                .filter(|&f| f > self.freq && f >= bottom && f <= top)
                .min()
        });
        match next {
            Some(freq) => {
                self.freq = freq;
                self.band_limit = false;
            }
            None if self.faults.wrap_seek => {
                self.freq = bottom;
                self.band_limit = false;
            }
            None => {
                self.freq = top;
                self.band_limit = true;
            }
        }
        self.complete();
    }

    /// Execute one command and produce its 16-byte response.
    fn execute(&mut self, frame: &[u8]) -> [u8; 16] {
        let mut resp = [0u8; 16];
        resp[0] = STATUS_CTS;
        let Some((&opcode, args)) = frame.split_first() else {
            resp[0] |= STATUS_ERR;
            return resp;
        };
        let arg = |i: usize| args.get(i).copied().unwrap_or(0);
        let word = |i: usize| u16::from_be_bytes([arg(i), arg(i + 1)]);

        match (opcode, self.function) {
            (POWER_UP, None) => {
                let band = if arg(0) & 0x0F == 0x01 {
                    Band::Am
                } else {
                    Band::Fm
                };
                self.function = Some(band);
                self.properties.clear();
                self.freq = 0;
                self.stc = false;
                self.band_limit = false;
            }
            (POWER_DOWN, _) => {
                self.function = None;
                self.stc = false;
            }
            (SET_PROPERTY, Some(_)) => {
                self.properties.insert(word(1), word(3));
            }
            (GET_PROPERTY, Some(_)) => {
                let value = self.properties.get(&word(1)).copied().unwrap_or(0);
                resp[2..4].copy_from_slice(&value.to_be_bytes());
            }
            (GET_INT_STATUS, _) => {}
            (FM_TUNE_FREQ, Some(Band::Fm)) | (AM_TUNE_FREQ, Some(Band::Am)) => {
                self.freq = word(1);
                self.band_limit = false;
                self.complete();
            }
            (FM_SEEK_START, Some(Band::Fm)) => self.seek_up(Band::Fm),
            (AM_SEEK_START, Some(Band::Am)) => self.seek_up(Band::Am),
            (FM_TUNE_STATUS, Some(band @ Band::Fm)) | (AM_TUNE_STATUS, Some(band @ Band::Am)) => {
                let station = self.station(band, self.freq);
                let mut resp1 = 0u8;
                if station.is_some_and(|s| s.valid) {
                    resp1 |= 0x01;
                }
                if self.band_limit {
                    resp1 |= 0x80;
                }
                resp[1] = resp1;
                resp[2..4].copy_from_slice(&self.freq.to_be_bytes());
                resp[4] = station.map_or(3, |s| s.rssi);
                resp[5] = station.map_or(0, |s| s.snr);
                if arg(0) & 0x01 != 0 {
                    self.stc = false;
                }
            }
            _ => {
                resp[0] |= STATUS_ERR;
            }
        }
        if self.stc {
            resp[0] |= STATUS_STCINT;
        }
        resp
    }
}

/// Simulated Si4730 on a bus. Clones share one chip.
#[derive(Debug, Clone)]
pub struct SimulatedTuner {
    chip: Arc<Mutex<Chip>>,
}

impl SimulatedTuner {
    /// A chip with no stations on air.
    pub fn new() -> Self {
        SimulatedTuner {
            chip: Arc::new(Mutex::new(Chip::default())),
        }
    }

    /// A chip with a plausible set of local stations on both bands.
    pub fn demo() -> Self {
        Self::new()
            .with_station(Band::Fm, 8810, 38, 22)
            .with_station(Band::Fm, 8990, 45, 28)
            .with_weak_station(Band::Fm, 9310)
            .with_station(Band::Fm, 9690, 51, 30)
            .with_station(Band::Fm, 10110, 33, 19)
            .with_station(Band::Fm, 10590, 41, 25)
            .with_station(Band::Am, 660, 48, 21)
            .with_station(Band::Am, 1010, 40, 17)
            .with_weak_station(Band::Am, 1250)
            .with_station(Band::Am, 1590, 29, 11)
    }

    fn lock(&self) -> MutexGuard<'_, Chip> {
        self.chip.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a receivable station.
    pub fn with_station(self, band: Band, freq: u16, rssi: u8, snr: u8) -> Self {
        self.add_station(
            band,
            SimStation {
                freq,
                rssi,
                snr,
                valid: true,
            },
        );
        self
    }

    /// Add a carrier that stops a seek but fails the validity check.
    pub fn with_weak_station(self, band: Band, freq: u16) -> Self {
        self.add_station(
            band,
            SimStation {
                freq,
                rssi: 8,
                snr: 1,
                valid: false,
            },
        );
        self
    }

    fn add_station(&self, band: Band, station: SimStation) {
        let mut chip = self.lock();
        let list = chip.stations.entry(band).or_default();
        list.retain(|s| s.freq != station.freq);
        list.push(station);
        list.sort_by_key(|s| s.freq);
    }

    // -- fault injection ---------------------------------------------------

    /// Stop raising clear-to-send.
    pub fn set_never_cts(&self, on: bool) {
        self.lock().faults.never_cts = on;
    }

    /// Stop raising seek/tune-complete.
    pub fn set_never_stc(&self, on: bool) {
        self.lock().faults.never_stc = on;
    }

    /// Report the error bit on status polls.
    pub fn set_status_error(&self, on: bool) {
        self.lock().faults.status_err = on;
    }

    /// Wrap seeks at the band top instead of reporting BLTF.
    pub fn set_wrap_seek(&self, on: bool) {
        self.lock().faults.wrap_seek = on;
    }

    // -- inspection --------------------------------------------------------

    /// Every command frame written, in order.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.lock().commands.clone()
    }

    /// Number of commands written with `opcode`.
    pub fn count(&self, opcode: u8) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.first() == Some(&opcode))
            .count()
    }

    pub fn power_ups(&self) -> usize {
        self.count(POWER_UP)
    }

    pub fn clear_log(&self) {
        self.lock().commands.clear();
    }

    pub fn function(&self) -> Option<Band> {
        self.lock().function
    }

    pub fn frequency(&self) -> u16 {
        self.lock().freq
    }

    pub fn property(&self, id: u16) -> Option<u16> {
        self.lock().properties.get(&id).copied()
    }

    pub fn reset_pulses(&self) -> usize {
        self.lock().reset_pulses
    }

    pub fn status_reads(&self) -> usize {
        self.lock().status_reads
    }
}

impl Default for SimulatedTuner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for SimulatedTuner {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut chip = self.lock();
        if chip.in_reset {
            return Err(Error::Bus("write while tuner held in reset".into()));
        }
        chip.commands.push(data.to_vec());
        let resp = chip.execute(data);
        trace!(cmd = ?data, status = resp[0], "simulated tuner command");
        chip.pending = Some(resp);
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut chip = self.lock();
        if chip.in_reset {
            return Err(Error::Bus("read while tuner held in reset".into()));
        }
        if buf.len() == 1 {
            chip.status_reads += 1;
            let mut status = if chip.faults.never_cts { 0 } else { STATUS_CTS };
            if chip.faults.status_err {
                status |= STATUS_ERR;
            }
            if chip.stc {
                status |= STATUS_STCINT;
            }
            buf[0] = status;
            return Ok(());
        }
        let resp = chip.pending.take().unwrap_or([STATUS_CTS; 16]);
        let n = buf.len().min(resp.len());
        buf[..n].copy_from_slice(&resp[..n]);
        Ok(())
    }

    async fn set_reset(&mut self, high: bool) -> Result<()> {
        let mut chip = self.lock();
        if high && chip.in_reset {
            chip.reset_pulses += 1;
        }
        chip.in_reset = !high;
        if !high {
            chip.function = None;
            chip.properties.clear();
            chip.stc = false;
            chip.pending = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cmd(bus: &mut SimulatedTuner, frame: &[u8]) -> [u8; 16] {
        bus.write(frame).await.unwrap();
        let mut resp = [0u8; 16];
        bus.read(&mut resp).await.unwrap();
        resp
    }

    #[tokio::test]
    async fn property_store_requires_power() {
        let mut bus = SimulatedTuner::new();
        let resp = cmd(&mut bus, &[0x12, 0x00, 0x40, 0x00, 0x00, 0x3F]).await;
        assert_ne!(resp[0] & STATUS_ERR, 0);

        cmd(&mut bus, &[0x01, 0x10, 0x05]).await;
        let resp = cmd(&mut bus, &[0x12, 0x00, 0x40, 0x00, 0x00, 0x3F]).await;
        assert_eq!(resp[0] & STATUS_ERR, 0);
        let resp = cmd(&mut bus, &[0x13, 0x00, 0x40, 0x00]).await;
        assert_eq!(&resp[2..4], &[0x00, 0x3F]);
        assert_eq!(bus.property(0x4000), Some(63));
    }

    #[tokio::test]
    async fn seek_walks_stations_then_reports_band_limit() {
        let mut bus = SimulatedTuner::new()
            .with_station(Band::Fm, 9990, 40, 20)
            .with_station(Band::Fm, 8810, 30, 10);
        cmd(&mut bus, &[0x01, 0x10, 0x05]).await;

        let mut found = Vec::new();
        loop {
            cmd(&mut bus, &[0x21, 0x08]).await;
            let status = cmd(&mut bus, &[0x14]).await;
            assert_ne!(status[0] & STATUS_STCINT, 0);
            let ts = cmd(&mut bus, &[0x22, 0x01]).await;
            assert_eq!(ts[0] & STATUS_STCINT, 0, "INTACK clears STC");
            if ts[1] & 0x01 != 0 {
                found.push(u16::from_be_bytes([ts[2], ts[3]]));
            }
            if ts[1] & 0x80 != 0 {
                break;
            }
        }
        assert_eq!(found, vec![8810, 9990]);
    }

    #[tokio::test]
    async fn wrong_function_is_rejected() {
        let mut bus = SimulatedTuner::new();
        cmd(&mut bus, &[0x01, 0x10, 0x05]).await;
        let resp = cmd(&mut bus, &[0x40, 0x00, 0x03, 0xF2, 0x00, 0x00]).await;
        assert_ne!(resp[0] & STATUS_ERR, 0);
    }

    #[tokio::test]
    async fn reset_line_blocks_traffic() {
        let mut bus = SimulatedTuner::new();
        bus.set_reset(false).await.unwrap();
        assert!(bus.write(&[0x11]).await.is_err());
        bus.set_reset(true).await.unwrap();
        assert_eq!(bus.reset_pulses(), 1);
        assert!(bus.write(&[0x11]).await.is_ok());
    }

    #[tokio::test]
    async fn never_cts_fault_clears_status() {
        let mut bus = SimulatedTuner::new();
        bus.set_never_cts(true);
        let mut status = [0u8; 1];
        bus.read(&mut status).await.unwrap();
        assert_eq!(status[0] & STATUS_CTS, 0);
    }
}

//! Shared value types passed between the driver, the servers and the CLI.

use crate::band::Band;

/// Result of a tune: whether the chip considers the channel valid, plus
/// signal quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneStatus {
    pub valid: bool,
    /// Received signal strength, dBµV.
    pub rssi: u8,
    /// Signal-to-noise ratio, dB.
    pub snr: u8,
}

/// A station discovered by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Station {
    pub band: Band,
    pub freq: u16,
}

/// Snapshot of the tuner's driver-side state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RadioStatus {
    /// Band last fully configured, if any.
    pub band: Option<Band>,
    /// Last successful tune.
    pub tuned: Option<(Band, u16)>,
    pub fm_channels: Vec<u16>,
    pub am_channels: Vec<u16>,
}

impl RadioStatus {
    pub fn channels(&self, band: Band) -> &[u16] {
        match band {
            Band::Am => &self.am_channels,
            Band::Fm => &self.fm_channels,
        }
    }

    /// Discovered stations in station-list order: FM first, then AM.
    pub fn stations(&self) -> Vec<Station> {
        Band::ALL
            .iter()
            .flat_map(|&band| {
                self.channels(band)
                    .iter()
                    .map(move |&freq| Station { band, freq })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stations_are_fm_then_am_in_discovery_order() {
        let status = RadioStatus {
            band: Some(Band::Am),
            tuned: None,
            fm_channels: vec![9990, 8810, 9990],
            am_channels: vec![1010],
        };
        let stations = status.stations();
        assert_eq!(
            stations,
            vec![
                Station { band: Band::Fm, freq: 9990 },
                Station { band: Band::Fm, freq: 8810 },
                Station { band: Band::Fm, freq: 9990 },
                Station { band: Band::Am, freq: 1010 },
            ]
        );
    }
}

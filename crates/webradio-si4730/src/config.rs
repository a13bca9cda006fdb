//! Band configuration tables.
//!
//! Selecting a band power-cycles the chip into the band's receive function
//! and then writes a table of properties. A [`BandConfig`] is that table:
//! the seek range (which also bounds valid tune frequencies), the audio
//! de-emphasis, the channel filter and a handful of band-specific options.
//!
//! [`BandConfig::fm_itu2`] and [`BandConfig::am_itu2`] are the ITU region 2
//! defaults the appliance ships with.

use webradio_core::{Band, Error, Result};

use crate::commands::*;

/// Audio de-emphasis time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deemphasis {
    Us50,
    Us75,
}

impl Deemphasis {
    fn property_value(self) -> u16 {
        match self {
            Deemphasis::Us50 => 1,
            Deemphasis::Us75 => 2,
        }
    }
}

/// FM channel filter bandwidth selection (0 = automatic).
pub const FM_CHANNEL_FILTER_AUTO: u16 = 0;
/// AM channel filter bandwidth selection (0 = 6 kHz).
pub const AM_CHANNEL_FILTER_6KHZ: u16 = 0;
/// Blend threshold that keeps the FM receiver in mono.
pub const FM_BLEND_FORCE_MONO: u16 = 127;
/// Antenna input selection: the FMI pin.
pub const FM_ANTENNA_FMI: u16 = 0;

/// Options that only exist in one band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandOptions {
    Fm {
        antenna_input: u16,
        /// RSSI below which the receiver blends to mono.
        blend_mono_threshold: u16,
        /// RSSI above which the receiver blends to stereo.
        blend_stereo_threshold: u16,
    },
    Am {
        /// Soft-mute attenuation cap in dB. 0 disables soft mute.
        soft_mute_max_attenuation: u16,
        seek_snr_threshold: u16,
        seek_rssi_threshold: u16,
    },
}

/// Property table applied after powering up into a band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandConfig {
    pub band: Band,
    pub seek_bottom: u16,
    pub seek_top: u16,
    pub seek_spacing: u16,
    pub deemphasis: Deemphasis,
    pub channel_filter: u16,
    pub options: BandOptions,
}

impl BandConfig {
    /// FM, ITU region 2: 88.0-108.0 MHz in 100 kHz steps.
    pub fn fm_itu2() -> Self {
        BandConfig {
            band: Band::Fm,
            seek_bottom: 8800,
            seek_top: 10800,
            seek_spacing: 10,
            deemphasis: Deemphasis::Us75,
            channel_filter: FM_CHANNEL_FILTER_AUTO,
            options: BandOptions::Fm {
                antenna_input: FM_ANTENNA_FMI,
                blend_mono_threshold: FM_BLEND_FORCE_MONO,
                blend_stereo_threshold: FM_BLEND_FORCE_MONO,
            },
        }
    }

    /// AM, ITU region 2: 520-1710 kHz in 10 kHz steps.
    pub fn am_itu2() -> Self {
        BandConfig {
            band: Band::Am,
            seek_bottom: 520,
            seek_top: 1710,
            seek_spacing: 10,
            deemphasis: Deemphasis::Us50,
            channel_filter: AM_CHANNEL_FILTER_6KHZ,
            options: BandOptions::Am {
                soft_mute_max_attenuation: 0,
                seek_snr_threshold: 0,
                seek_rssi_threshold: 20,
            },
        }
    }

    /// Default table for `band`.
    pub fn itu2(band: Band) -> Self {
        match band {
            Band::Fm => Self::fm_itu2(),
            Band::Am => Self::am_itu2(),
        }
    }

    /// Check that the table is self-consistent and matches its band.
    pub fn validate(&self) -> Result<()> {
        let options_band = match self.options {
            BandOptions::Fm { .. } => Band::Fm,
            BandOptions::Am { .. } => Band::Am,
        };
        if options_band != self.band {
            return Err(Error::InvalidBand(format!(
                "{} options in a {} table",
                options_band, self.band
            )));
        }
        if self.seek_bottom > self.seek_top || self.seek_spacing == 0 {
            return Err(Error::Protocol(format!(
                "bad {} seek range {}..={} step {}",
                self.band, self.seek_bottom, self.seek_top, self.seek_spacing
            )));
        }
        Ok(())
    }

    /// Whether `freq` lies within the seek limits.
    pub fn contains(&self, freq: u32) -> bool {
        (u32::from(self.seek_bottom)..=u32::from(self.seek_top)).contains(&freq)
    }

    /// Fail with [`Error::FrequencyOutOfRange`] unless [`contains`](Self::contains).
    pub fn check_frequency(&self, freq: u32) -> Result<u16> {
        if self.contains(freq) {
            // In range implies it fits in u16.
            Ok(freq as u16)
        } else {
            Err(Error::FrequencyOutOfRange {
                band: self.band,
                freq,
                min: self.seek_bottom,
                max: self.seek_top,
            })
        }
    }

    /// Upper bound on seeks needed to sweep the whole band once.
    pub fn max_seek_steps(&self) -> usize {
        usize::from((self.seek_top - self.seek_bottom) / self.seek_spacing) + 2
    }

    /// Property writes for this band, in the order the chip expects them.
    ///
    /// Volume and hard mute are not part of the table; the driver applies
    /// them after every band change.
    pub fn property_writes(&self) -> Vec<(u16, u16)> {
        match self.options {
            BandOptions::Fm {
                antenna_input,
                blend_mono_threshold,
                blend_stereo_threshold,
            } => vec![
                (FM_ANTENNA_INPUT, antenna_input),
                (FM_DEEMPHASIS, self.deemphasis.property_value()),
                (FM_BLEND_MONO_THRESHOLD, blend_mono_threshold),
                (FM_BLEND_STEREO_THRESHOLD, blend_stereo_threshold),
                (FM_CHANNEL_FILTER, self.channel_filter),
                (FM_SEEK_BAND_BOTTOM, self.seek_bottom),
                (FM_SEEK_BAND_TOP, self.seek_top),
                (FM_SEEK_FREQ_SPACING, self.seek_spacing),
            ],
            BandOptions::Am {
                soft_mute_max_attenuation,
                seek_snr_threshold,
                seek_rssi_threshold,
            } => vec![
                (AM_DEEMPHASIS, self.deemphasis.property_value()),
                (AM_SOFT_MUTE_MAX_ATTENUATION, soft_mute_max_attenuation),
                (AM_CHANNEL_FILTER, self.channel_filter),
                (AM_SEEK_BAND_BOTTOM, self.seek_bottom),
                (AM_SEEK_BAND_TOP, self.seek_top),
                (AM_SEEK_FREQ_SPACING, self.seek_spacing),
                (AM_SEEK_TUNE_SNR_THRESHOLD, seek_snr_threshold),
                (AM_SEEK_TUNE_RSSI_THRESHOLD, seek_rssi_threshold),
            ],
        }
    }
}

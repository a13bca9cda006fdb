//! Si4730 command builders and response parsers.
//!
//! This module provides the command opcodes, argument flags, status bits and
//! property ids of the Si473x programming interface, plus functions that
//! construct [`CommandFrame`]s and interpret [`ResponseFrame`]s.
//!
//! All functions are pure -- they produce or consume bytes without performing
//! any I/O. The driver is responsible for waiting for clear-to-send, writing
//! the frame over the bus and reading back the 16-byte response.
//!
//! # Frame layout
//!
//! An outbound frame is one opcode byte followed by 0-5 argument bytes.
//! Every response is 16 bytes; byte 0 is the status register (CTS, ERR,
//! STCINT), the remaining bytes are command-specific. Multi-byte values
//! (frequencies, property ids and values) are big-endian.

use bytes::{BufMut, Bytes, BytesMut};

use webradio_core::{Band, Error, Result, TuneStatus};

// ---------------------------------------------------------------
// Status register
// ---------------------------------------------------------------

/// Clear to send: the chip accepts the next command.
pub const STATUS_CTS: u8 = 0x80;
/// The previous command failed.
pub const STATUS_ERR: u8 = 0x40;
/// Seek/tune complete interrupt.
pub const STATUS_STCINT: u8 = 0x01;

// ---------------------------------------------------------------
// Opcodes and argument flags
// ---------------------------------------------------------------

pub const POWER_UP: u8 = 0x01;
/// External 32.768 kHz crystal oscillator enable.
pub const POWER_UP_ARG1_XOSCEN: u8 = 0x10;
pub const POWER_UP_ARG1_FUNC_FM: u8 = 0x00;
pub const POWER_UP_ARG1_FUNC_AM: u8 = 0x01;
/// Analog audio outputs (LOUT/ROUT).
pub const POWER_UP_ARG2_OPMODE_ANALOG: u8 = 0x05;

pub const POWER_DOWN: u8 = 0x11;
pub const SET_PROPERTY: u8 = 0x12;
pub const GET_PROPERTY: u8 = 0x13;
pub const GET_INT_STATUS: u8 = 0x14;

pub const FM_TUNE_FREQ: u8 = 0x20;
pub const FM_SEEK_START: u8 = 0x21;
pub const FM_TUNE_STATUS: u8 = 0x22;

pub const AM_TUNE_FREQ: u8 = 0x40;
pub const AM_SEEK_START: u8 = 0x41;
pub const AM_TUNE_STATUS: u8 = 0x42;

/// Seek towards higher frequencies.
pub const SEEK_START_ARG1_SEEKUP: u8 = 0x08;

/// Acknowledge (clear) the seek/tune-complete interrupt.
pub const TUNE_STATUS_ARG1_INTACK: u8 = 0x01;

/// Tune status RESP1: the channel is valid.
pub const TUNE_STATUS_RESP1_VALID: u8 = 0x01;
/// Tune status RESP1: a seek hit the band limit or wrapped.
pub const TUNE_STATUS_RESP1_BLTF: u8 = 0x80;

// ---------------------------------------------------------------
// Properties
// ---------------------------------------------------------------

pub const FM_DEEMPHASIS: u16 = 0x1100;
pub const FM_CHANNEL_FILTER: u16 = 0x1102;
pub const FM_BLEND_STEREO_THRESHOLD: u16 = 0x1105;
pub const FM_BLEND_MONO_THRESHOLD: u16 = 0x1106;
pub const FM_ANTENNA_INPUT: u16 = 0x1107;
pub const FM_SEEK_BAND_BOTTOM: u16 = 0x1400;
pub const FM_SEEK_BAND_TOP: u16 = 0x1401;
pub const FM_SEEK_FREQ_SPACING: u16 = 0x1402;

pub const AM_DEEMPHASIS: u16 = 0x3100;
pub const AM_CHANNEL_FILTER: u16 = 0x3102;
pub const AM_SOFT_MUTE_MAX_ATTENUATION: u16 = 0x3302;
pub const AM_SEEK_BAND_BOTTOM: u16 = 0x3400;
pub const AM_SEEK_BAND_TOP: u16 = 0x3401;
pub const AM_SEEK_FREQ_SPACING: u16 = 0x3402;
pub const AM_SEEK_TUNE_SNR_THRESHOLD: u16 = 0x3403;
pub const AM_SEEK_TUNE_RSSI_THRESHOLD: u16 = 0x3404;

pub const RX_VOLUME: u16 = 0x4000;
pub const RX_HARD_MUTE: u16 = 0x4001;

/// Highest value accepted by [`RX_VOLUME`].
pub const RX_VOLUME_MAX: u16 = 63;

/// Maximum argument bytes in one command frame.
pub const MAX_ARGS: usize = 5;
/// Length of every response frame.
pub const RESPONSE_LEN: usize = 16;

// ---------------------------------------------------------------
// Frames
// ---------------------------------------------------------------

/// One outbound command: opcode plus up to [`MAX_ARGS`] argument bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: u8,
    args: [u8; MAX_ARGS],
    len: usize,
}

impl CommandFrame {
    /// Build a frame, rejecting argument lists longer than [`MAX_ARGS`].
    pub fn new(opcode: u8, args: &[u8]) -> Result<Self> {
        if args.len() > MAX_ARGS {
            return Err(Error::Protocol(format!(
                "command 0x{opcode:02X} has {} argument bytes, max {MAX_ARGS}",
                args.len()
            )));
        }
        let mut buf = [0u8; MAX_ARGS];
        buf[..args.len()].copy_from_slice(args);
        Ok(CommandFrame {
            opcode,
            args: buf,
            len: args.len(),
        })
    }

    /// Frames built inside this module are known to fit.
    fn fixed<const N: usize>(opcode: u8, args: [u8; N]) -> Self {
        let mut buf = [0u8; MAX_ARGS];
        let len = N.min(MAX_ARGS);
        buf[..len].copy_from_slice(&args[..len]);
        CommandFrame {
            opcode,
            args: buf,
            len,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn args(&self) -> &[u8] {
        &self.args[..self.len]
    }

    /// Wire bytes: opcode followed by arguments.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.len);
        buf.put_u8(self.opcode);
        buf.put_slice(self.args());
        buf.freeze()
    }
}

/// One 16-byte response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame([u8; RESPONSE_LEN]);

impl ResponseFrame {
    pub fn new(bytes: [u8; RESPONSE_LEN]) -> Self {
        ResponseFrame(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; RESPONSE_LEN] {
        &self.0
    }

    pub fn status(&self) -> u8 {
        self.0[0]
    }

    pub fn err(&self) -> bool {
        self.status() & STATUS_ERR != 0
    }

    pub fn stc(&self) -> bool {
        self.status() & STATUS_STCINT != 0
    }

    /// Property value from a GET_PROPERTY response (RESP2..3).
    pub fn property_value(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    /// Decode a FM/AM_TUNE_STATUS response.
    pub fn tune_status(&self) -> TuneStatusResponse {
        TuneStatusResponse {
            valid: self.0[1] & TUNE_STATUS_RESP1_VALID != 0,
            band_limit: self.0[1] & TUNE_STATUS_RESP1_BLTF != 0,
            freq: u16::from_be_bytes([self.0[2], self.0[3]]),
            rssi: self.0[4],
            snr: self.0[5],
        }
    }
}

/// Decoded tune status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneStatusResponse {
    pub valid: bool,
    /// BLTF: the seek reached the band limit.
    pub band_limit: bool,
    pub freq: u16,
    pub rssi: u8,
    pub snr: u8,
}

impl From<TuneStatusResponse> for TuneStatus {
    fn from(r: TuneStatusResponse) -> Self {
        TuneStatus {
            valid: r.valid,
            rssi: r.rssi,
            snr: r.snr,
        }
    }
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// POWER_UP in the band's receive function with analog audio out.
pub fn cmd_power_up(band: Band) -> CommandFrame {
    let func = match band {
        Band::Fm => POWER_UP_ARG1_FUNC_FM,
        Band::Am => POWER_UP_ARG1_FUNC_AM,
    };
    CommandFrame::fixed(
        POWER_UP,
        [POWER_UP_ARG1_XOSCEN | func, POWER_UP_ARG2_OPMODE_ANALOG],
    )
}

pub fn cmd_power_down() -> CommandFrame {
    CommandFrame::fixed(POWER_DOWN, [])
}

/// SET_PROPERTY: `0x12 0x00 idH idL valH valL`.
pub fn cmd_set_property(id: u16, value: u16) -> CommandFrame {
    let [id_hi, id_lo] = id.to_be_bytes();
    let [val_hi, val_lo] = value.to_be_bytes();
    CommandFrame::fixed(SET_PROPERTY, [0x00, id_hi, id_lo, val_hi, val_lo])
}

/// GET_PROPERTY: `0x13 0x00 idH idL`.
pub fn cmd_get_property(id: u16) -> CommandFrame {
    let [id_hi, id_lo] = id.to_be_bytes();
    CommandFrame::fixed(GET_PROPERTY, [0x00, id_hi, id_lo])
}

pub fn cmd_get_int_status() -> CommandFrame {
    CommandFrame::fixed(GET_INT_STATUS, [])
}

/// FM_TUNE_FREQ / AM_TUNE_FREQ with a big-endian frequency.
///
/// The AM variant carries an extra trailing antenna-capacitor byte
/// (zero: automatic).
pub fn cmd_tune_freq(band: Band, freq: u16) -> CommandFrame {
    let [hi, lo] = freq.to_be_bytes();
    match band {
        Band::Fm => CommandFrame::fixed(FM_TUNE_FREQ, [0x00, hi, lo, 0x00]),
        Band::Am => CommandFrame::fixed(AM_TUNE_FREQ, [0x00, hi, lo, 0x00, 0x00]),
    }
}

/// Seek up, stopping at the band limit.
pub fn cmd_seek_up(band: Band) -> CommandFrame {
    let opcode = match band {
        Band::Fm => FM_SEEK_START,
        Band::Am => AM_SEEK_START,
    };
    CommandFrame::fixed(opcode, [SEEK_START_ARG1_SEEKUP])
}

/// Tune status, acknowledging the seek/tune-complete interrupt.
pub fn cmd_tune_status(band: Band) -> CommandFrame {
    let opcode = match band {
        Band::Fm => FM_TUNE_STATUS,
        Band::Am => AM_TUNE_STATUS,
    };
    CommandFrame::fixed(opcode, [TUNE_STATUS_ARG1_INTACK])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(bytes: &[u8]) -> ResponseFrame {
        let mut buf = [0u8; RESPONSE_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        ResponseFrame::new(buf)
    }

    #[test]
    fn power_up_fm_and_am() {
        assert_eq!(&cmd_power_up(Band::Fm).encode()[..], &[0x01, 0x10, 0x05]);
        assert_eq!(&cmd_power_up(Band::Am).encode()[..], &[0x01, 0x11, 0x05]);
    }

    #[test]
    fn power_down_has_no_args() {
        assert_eq!(&cmd_power_down().encode()[..], &[0x11]);
        assert!(cmd_power_down().args().is_empty());
    }

    #[test]
    fn set_property_is_big_endian() {
        assert_eq!(
            &cmd_set_property(FM_SEEK_BAND_BOTTOM, 8800).encode()[..],
            &[0x12, 0x00, 0x14, 0x00, 0x22, 0x60]
        );
    }

    #[test]
    fn get_property_is_big_endian() {
        assert_eq!(
            &cmd_get_property(RX_VOLUME).encode()[..],
            &[0x13, 0x00, 0x40, 0x00]
        );
    }

    #[test]
    fn tune_freq_shapes() {
        // 99.9 MHz = 9990 = 0x2706
        assert_eq!(
            &cmd_tune_freq(Band::Fm, 9990).encode()[..],
            &[0x20, 0x00, 0x27, 0x06, 0x00]
        );
        // 1010 kHz = 0x03F2
        assert_eq!(
            &cmd_tune_freq(Band::Am, 1010).encode()[..],
            &[0x40, 0x00, 0x03, 0xF2, 0x00, 0x00]
        );
    }

    #[test]
    fn seek_and_status_opcodes() {
        assert_eq!(&cmd_seek_up(Band::Fm).encode()[..], &[0x21, 0x08]);
        assert_eq!(&cmd_seek_up(Band::Am).encode()[..], &[0x41, 0x08]);
        assert_eq!(&cmd_tune_status(Band::Fm).encode()[..], &[0x22, 0x01]);
        assert_eq!(&cmd_tune_status(Band::Am).encode()[..], &[0x42, 0x01]);
        assert_eq!(&cmd_get_int_status().encode()[..], &[0x14]);
    }

    #[test]
    fn frame_rejects_too_many_args() {
        assert!(CommandFrame::new(0x12, &[0; 5]).is_ok());
        let err = CommandFrame::new(0x12, &[0; 6]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn status_bits() {
        let r = response(&[0x81]);
        assert!(r.stc());
        assert!(!r.err());
        assert!(response(&[0xC0]).err());
    }

    #[test]
    fn parse_tune_status() {
        let r = response(&[0x80, 0x01, 0x27, 0x06, 42, 17]);
        let ts = r.tune_status();
        assert!(ts.valid);
        assert!(!ts.band_limit);
        assert_eq!(ts.freq, 9990);
        assert_eq!(ts.rssi, 42);
        assert_eq!(ts.snr, 17);

        let r = response(&[0x80, 0x80, 0x2A, 0x30, 0, 0]);
        let ts = r.tune_status();
        assert!(!ts.valid);
        assert!(ts.band_limit);
        assert_eq!(ts.freq, 10800);
    }

    #[test]
    fn parse_property_value() {
        let r = response(&[0x80, 0x00, 0x00, 0x3F]);
        assert_eq!(r.property_value(), 63);
    }
}

//! WAV stream header.
//!
//! Listeners receive one canonical 44-byte RIFF/WAVE header followed by raw
//! PCM for as long as they stay connected. Since the stream has no end, both
//! the RIFF chunk size and the data chunk size are `0xFFFFFFFF`, which
//! players treat as "read until the connection closes".

use bytes::{BufMut, Bytes, BytesMut};

/// Length of the canonical PCM header.
pub const HEADER_LEN: usize = 44;
/// Chunk size used for an unbounded stream.
pub const UNBOUNDED: u32 = 0xFFFF_FFFF;

const WAVE_FORMAT_PCM: u16 = 1;

/// PCM layout of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for WavFormat {
    /// 30 kHz, mono, 8-bit unsigned: what the ADC produces.
    fn default() -> Self {
        WavFormat {
            sample_rate: 30_000,
            channels: 1,
            bits_per_sample: 8,
        }
    }
}

impl WavFormat {
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    /// Header for an unbounded stream in this format.
    pub fn stream_header(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_slice(b"RIFF");
        buf.put_u32_le(UNBOUNDED);
        buf.put_slice(b"WAVE");

        buf.put_slice(b"fmt ");
        buf.put_u32_le(16);
        buf.put_u16_le(WAVE_FORMAT_PCM);
        buf.put_u16_le(self.channels);
        buf.put_u32_le(self.sample_rate);
        buf.put_u32_le(self.byte_rate());
        buf.put_u16_le(self.block_align());
        buf.put_u16_le(self.bits_per_sample);

        buf.put_slice(b"data");
        buf.put_u32_le(UNBOUNDED);
        buf.freeze()
    }
}

//! webradio-audio: the audio side of the web radio.
//!
//! - [`wav`] -- the endless-stream WAV header
//! - [`pool`] -- [`SlotPool`], listener slots with lossy per-slot FIFOs
//! - [`capture`] -- [`Capture`] sources: a test tone and a looping WAV file
//! - [`buffers`] -- [`AudioBuffers`], the
//!   [`AudioBufferSource`](webradio_core::AudioBufferSource) the servers
//!   stream from

pub mod buffers;
pub mod capture;
pub mod pool;
pub mod wav;

pub use buffers::AudioBuffers;
pub use capture::{Capture, DEFAULT_CHUNK_SAMPLES, ToneCapture, WavFileCapture};
pub use pool::{PoolConfig, SlotPool};
pub use wav::WavFormat;

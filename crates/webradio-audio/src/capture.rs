//! Sample capture sources.
//!
//! A [`Capture`] produces fixed-size PCM chunks at the real-time rate of its
//! [`WavFormat`]. On the board this is the ADC behind the tuner's analog
//! output; on a host it is either a synthesised test tone or a WAV file
//! played in a loop.

use std::f64::consts::TAU;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::info;

use webradio_core::{Error, Result};

use crate::wav::WavFormat;

/// Samples per chunk at the default rate: 100 ms of audio.
pub const DEFAULT_CHUNK_SAMPLES: usize = 3000;

/// A real-time source of PCM chunks.
#[async_trait]
pub trait Capture: Send {
    fn format(&self) -> WavFormat;

    /// Wait for and return the next chunk.
    async fn next_chunk(&mut self) -> Result<Bytes>;
}

#[async_trait]
impl<C: Capture + ?Sized> Capture for Box<C> {
    fn format(&self) -> WavFormat {
        (**self).format()
    }

    async fn next_chunk(&mut self) -> Result<Bytes> {
        (**self).next_chunk().await
    }
}

fn check_samples(samples: usize) -> Result<()> {
    if samples == 0 {
        return Err(Error::Protocol("chunk size must be at least one sample".into()));
    }
    Ok(())
}

fn chunk_period(format: WavFormat, samples: usize) -> Duration {
    Duration::from_secs_f64(samples as f64 / f64::from(format.sample_rate.max(1)))
}

/// Created on first use so captures can be built outside a runtime.
fn pacer(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

// ---------------------------------------------------------------------------
// Test tone
// ---------------------------------------------------------------------------

/// Unsigned 8-bit mono sine wave.
pub struct ToneCapture {
    format: WavFormat,
    tone_hz: f64,
    amplitude: f64,
    phase: f64,
    samples: usize,
    period: Duration,
    ticker: Option<Interval>,
}

impl ToneCapture {
    pub fn new(tone_hz: f64, sample_rate: u32, samples: usize) -> Result<Self> {
        check_samples(samples)?;
        Ok(Self::with_chunk(tone_hz, sample_rate, samples))
    }

    fn with_chunk(tone_hz: f64, sample_rate: u32, samples: usize) -> Self {
        let format = WavFormat {
            sample_rate,
            channels: 1,
            bits_per_sample: 8,
        };
        ToneCapture {
            format,
            tone_hz,
            amplitude: 0.5,
            phase: 0.0,
            samples,
            period: chunk_period(format, samples),
            ticker: None,
        }
    }

    /// Peak level as a fraction of full scale.
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    fn render(&mut self) -> Bytes {
        let step = TAU * self.tone_hz / f64::from(self.format.sample_rate);
        let mut buf = BytesMut::with_capacity(self.samples);
        for _ in 0..self.samples {
            let s = 128.0 + 127.0 * self.amplitude * self.phase.sin();
            buf.put_u8(s.round().clamp(0.0, 255.0) as u8);
            self.phase = (self.phase + step) % TAU;
        }
        buf.freeze()
    }
}

impl Default for ToneCapture {
    /// 1 kHz at the default stream format.
    fn default() -> Self {
        Self::with_chunk(1000.0, WavFormat::default().sample_rate, DEFAULT_CHUNK_SAMPLES)
    }
}

#[async_trait]
impl Capture for ToneCapture {
    fn format(&self) -> WavFormat {
        self.format
    }

    async fn next_chunk(&mut self) -> Result<Bytes> {
        let period = self.period;
        self.ticker.get_or_insert_with(|| pacer(period)).tick().await;
        Ok(self.render())
    }
}

// ---------------------------------------------------------------------------
// WAV file
// ---------------------------------------------------------------------------

/// Loops the audio of a WAV file as unsigned 8-bit mono.
///
/// Multi-channel files are reduced to their first channel; integer and
/// float samples of any width are rescaled to 8 bits.
pub struct WavFileCapture {
    format: WavFormat,
    pcm: Bytes,
    cursor: usize,
    samples: usize,
    period: Duration,
    ticker: Option<Interval>,
}

impl WavFileCapture {
    pub fn open(path: impl AsRef<Path>, samples: usize) -> Result<Self> {
        let path = path.as_ref();
        check_samples(samples)?;
        let mut reader = hound::WavReader::open(path).map_err(|e| wav_error(path, e))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let mono: Vec<u8> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let shift = u32::from(spec.bits_per_sample.saturating_sub(8));
                reader
                    .samples::<i32>()
                    .step_by(channels)
                    .map(|s| s.map(|v| ((v >> shift) + 128).clamp(0, 255) as u8))
                    .collect::<std::result::Result<_, _>>()
            }
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .step_by(channels)
                .map(|s| s.map(|v| (128.0 + 127.0 * v.clamp(-1.0, 1.0)).round() as u8))
                .collect::<std::result::Result<_, _>>(),
        }
        .map_err(|e| wav_error(path, e))?;

        if mono.is_empty() {
            return Err(Error::Protocol(format!(
                "{} contains no samples",
                path.display()
            )));
        }

        let format = WavFormat {
            sample_rate: spec.sample_rate,
            channels: 1,
            bits_per_sample: 8,
        };
        info!(
            path = %path.display(),
            rate = spec.sample_rate,
            samples = mono.len(),
            "loaded WAV capture"
        );
        Ok(WavFileCapture {
            format,
            pcm: Bytes::from(mono),
            cursor: 0,
            samples,
            period: chunk_period(format, samples),
            ticker: None,
        })
    }

    fn take(&mut self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.samples);
        while buf.len() < self.samples {
            let want = self.samples - buf.len();
            let end = (self.cursor + want).min(self.pcm.len());
            buf.put_slice(&self.pcm[self.cursor..end]);
            self.cursor = if end == self.pcm.len() { 0 } else { end };
        }
        buf.freeze()
    }
}

fn wav_error(path: &Path, e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(io) => Error::Io(io),
        other => Error::Protocol(format!("{}: {other}", path.display())),
    }
}

#[async_trait]
impl Capture for WavFileCapture {
    fn format(&self) -> WavFormat {
        self.format
    }

    async fn next_chunk(&mut self) -> Result<Bytes> {
        let period = self.period;
        self.ticker.get_or_insert_with(|| pacer(period)).tick().await;
        Ok(self.take())
    }
}

//! The appliance's [`AudioBufferSource`].
//!
//! [`AudioBuffers`] ties a stream header to a [`SlotPool`]. Creating it
//! prepares the pool; [`AudioBuffers::start`] spawns the capture pump,
//! which publishes every chunk from a [`Capture`] into every live slot
//! until cancelled.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use webradio_core::{AudioBufferSource, Error, Result, SlotId};

use crate::capture::Capture;
use crate::pool::{PoolConfig, SlotPool};
use crate::wav::WavFormat;

/// Header plus slot pool.
#[derive(Debug)]
pub struct AudioBuffers {
    format: WavFormat,
    header: Bytes,
    pool: SlotPool,
}

impl AudioBuffers {
    pub fn new(format: WavFormat, config: PoolConfig) -> Self {
        info!(
            rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            slots = config.slots,
            depth = config.depth,
            "audio buffers ready"
        );
        AudioBuffers {
            format,
            header: format.stream_header(),
            pool: SlotPool::new(config),
        }
    }

    pub fn format(&self) -> WavFormat {
        self.format
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Publish one chunk to every live slot.
    pub fn publish(&self, chunk: Bytes) {
        self.pool.publish(chunk);
    }

    /// Spawn the capture pump.
    ///
    /// The capture must produce the format the header advertises.
    pub fn start<C>(self: &Arc<Self>, mut capture: C, cancel: CancellationToken) -> Result<JoinHandle<()>>
    where
        C: Capture + 'static,
    {
        if capture.format() != self.format {
            return Err(Error::Protocol(format!(
                "capture produces {:?}, stream header advertises {:?}",
                capture.format(),
                self.format
            )));
        }
        let buffers = Arc::clone(self);
        Ok(tokio::spawn(async move {
            info!("audio capture started");
            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    chunk = capture.next_chunk() => match chunk {
                        Ok(chunk) => buffers.publish(chunk),
                        Err(e) => {
                            error!(error = %e, "audio capture failed");
                            break;
                        }
                    },
                }
            }
            debug!("audio capture stopped");
        }))
    }
}

impl AudioBufferSource for AudioBuffers {
    fn header(&self) -> Bytes {
        self.header.clone()
    }

    fn acquire(&self) -> Result<SlotId> {
        self.pool.acquire()
    }

    fn fetch(&self, slot: SlotId) -> Result<Bytes> {
        self.pool.fetch(slot)
    }

    fn release(&self, slot: SlotId) {
        self.pool.release(slot)
    }

    fn live(&self) -> usize {
        self.pool.live()
    }

    fn capacity(&self) -> usize {
        self.pool.capacity()
    }
}

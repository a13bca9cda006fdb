//! Audio buffer source contract and per-client stream slots.
//!
//! An [`AudioBufferSource`] owns all sample memory and hands each connected
//! listener a slot: a private queue of chunks that advances independently of
//! every other listener. Streaming code never touches slot indices directly;
//! it holds a [`StreamSlot`] lease, which returns the slot to the pool when
//! dropped. The lease is what guarantees each slot is released exactly once,
//! whichever way the stream ends.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::Result;

/// Index of a live slot in an audio buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A source of continuously produced audio for a bounded number of clients.
///
/// Implementations must make `acquire` and `release` atomic with respect to
/// each other: a slot index is never handed to two live clients, and
/// releasing an index that is not live is a no-op.
pub trait AudioBufferSource: Send + Sync {
    /// Container header bytes, identical for every stream.
    fn header(&self) -> Bytes;

    /// Claim a free slot.
    ///
    /// Fails with [`Error::NoSlot`](crate::Error::NoSlot) when the pool is
    /// at capacity.
    fn acquire(&self) -> Result<SlotId>;

    /// Take the next chunk queued for `slot`.
    ///
    /// Returns an empty buffer when nothing is ready yet. Fails with
    /// [`Error::UnknownSlot`](crate::Error::UnknownSlot) if `slot` is not live.
    fn fetch(&self, slot: SlotId) -> Result<Bytes>;

    /// Return `slot` to the pool.
    fn release(&self, slot: SlotId);

    /// Number of slots currently held.
    fn live(&self) -> usize;

    /// Maximum number of concurrent slots.
    fn capacity(&self) -> usize;
}

/// RAII lease on one audio slot.
///
/// Dropping the lease releases the slot.
pub struct StreamSlot {
    source: Arc<dyn AudioBufferSource>,
    id: SlotId,
}

impl StreamSlot {
    /// Acquire a slot from `source`.
    pub fn acquire(source: Arc<dyn AudioBufferSource>) -> Result<Self> {
        let id = source.acquire()?;
        debug!(slot = %id, "audio slot acquired");
        Ok(StreamSlot { source, id })
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The stream header of the owning source.
    pub fn header(&self) -> Bytes {
        self.source.header()
    }

    /// Next chunk for this slot; empty when none is ready.
    pub fn fetch(&self) -> Result<Bytes> {
        self.source.fetch(self.id)
    }
}

impl fmt::Debug for StreamSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSlot").field("id", &self.id).finish()
    }
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        self.source.release(self.id);
        debug!(slot = %self.id, "audio slot released");
    }
}

//! Slot pool with per-slot lossy FIFOs.
//!
//! The pool is an arena of `capacity` slots plus a free list. Acquiring
//! takes the lowest free index; releasing puts it back. A live slot owns a
//! FIFO of at most `depth` chunks. Publishing pushes the chunk onto every
//! live FIFO, evicting the oldest chunk of any FIFO that is full, so a
//! stalled listener loses audio instead of holding memory or slowing the
//! others down.
//!
//! All state sits behind one mutex that is never held across an await.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::{debug, warn};

use webradio_core::{Error, Result, SlotId};

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum concurrent listeners.
    pub slots: usize,
    /// Chunks buffered per listener before the oldest is dropped.
    pub depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            slots: 1,
            depth: 16,
        }
    }
}

#[derive(Debug, Default)]
struct Fifo {
    chunks: VecDeque<Bytes>,
    dropped: u64,
}

#[derive(Debug)]
struct State {
    slots: Vec<Option<Fifo>>,
    free: BTreeSet<u32>,
}

/// Bounded set of listener FIFOs.
#[derive(Debug)]
pub struct SlotPool {
    depth: usize,
    state: Mutex<State>,
}

impl SlotPool {
    pub fn new(config: PoolConfig) -> Self {
        let capacity = u32::try_from(config.slots).unwrap_or(u32::MAX);
        SlotPool {
            depth: config.depth.max(1),
            state: Mutex::new(State {
                slots: (0..capacity).map(|_| None).collect(),
                free: (0..capacity).collect(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn live(&self) -> usize {
        let state = self.lock();
        state.slots.len() - state.free.len()
    }

    /// Claim the lowest free slot with an empty FIFO.
    pub fn acquire(&self) -> Result<SlotId> {
        let mut state = self.lock();
        let Some(index) = state.free.pop_first() else {
            return Err(Error::NoSlot);
        };
        state.slots[index as usize] = Some(Fifo::default());
        Ok(SlotId(index))
    }

    /// Return a slot. Unknown or already-free indices are ignored.
    pub fn release(&self, slot: SlotId) {
        let mut state = self.lock();
        let index = slot.0 as usize;
        match state.slots.get_mut(index).and_then(Option::take) {
            Some(fifo) => {
                state.free.insert(slot.0);
                if fifo.dropped > 0 {
                    debug!(%slot, dropped = fifo.dropped, "listener fell behind");
                }
            }
            None => warn!(%slot, "release of a slot that is not live"),
        }
    }

    /// Next chunk for `slot`, or an empty buffer when none is queued.
    pub fn fetch(&self, slot: SlotId) -> Result<Bytes> {
        let mut state = self.lock();
        match state.slots.get_mut(slot.0 as usize) {
            Some(Some(fifo)) => Ok(fifo.chunks.pop_front().unwrap_or_default()),
            _ => Err(Error::UnknownSlot(slot.0)),
        }
    }

    /// Queue `chunk` for every live slot.
    pub fn publish(&self, chunk: Bytes) {
        let depth = self.depth;
        let mut state = self.lock();
        for fifo in state.slots.iter_mut().flatten() {
            if fifo.chunks.len() >= depth {
                fifo.chunks.pop_front();
                fifo.dropped += 1;
            }
            fifo.chunks.push_back(chunk.clone());
        }
    }

    /// Chunks dropped so far for `slot`.
    pub fn dropped(&self, slot: SlotId) -> Option<u64> {
        match self.lock().slots.get(slot.0 as usize) {
            Some(Some(fifo)) => Some(fifo.dropped),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(slots: usize, depth: usize) -> SlotPool {
        SlotPool::new(PoolConfig { slots, depth })
    }

    #[test]
    fn acquire_lowest_free_until_exhausted() {
        let p = pool(3, 4);
        assert_eq!(p.acquire().unwrap(), SlotId(0));
        assert_eq!(p.acquire().unwrap(), SlotId(1));
        assert_eq!(p.acquire().unwrap(), SlotId(2));
        assert!(matches!(p.acquire(), Err(Error::NoSlot)));
        assert_eq!(p.live(), 3);

        p.release(SlotId(1));
        assert_eq!(p.live(), 2);
        assert_eq!(p.acquire().unwrap(), SlotId(1));
    }

    #[test]
    fn double_release_is_a_no_op() {
        let p = pool(2, 4);
        let a = p.acquire().unwrap();
        p.release(a);
        p.release(a);
        p.release(SlotId(99));
        assert_eq!(p.live(), 0);
        // Both slots still come back exactly once.
        assert_eq!(p.acquire().unwrap(), SlotId(0));
        assert_eq!(p.acquire().unwrap(), SlotId(1));
        assert!(p.acquire().is_err());
    }

    #[test]
    fn live_never_exceeds_capacity() {
        let p = pool(2, 1);
        for round in 0..10 {
            let got: Vec<_> = (0..5).filter_map(|_| p.acquire().ok()).collect();
            assert_eq!(got.len(), 2, "round {round}");
            assert!(p.live() <= p.capacity());
            for s in got {
                p.release(s);
            }
        }
    }

    #[test]
    fn chunks_reach_every_live_slot_in_order() {
        let p = pool(2, 8);
        let a = p.acquire().unwrap();
        p.publish(Bytes::from_static(b"one"));
        let b = p.acquire().unwrap();
        p.publish(Bytes::from_static(b"two"));
        p.publish(Bytes::from_static(b"three"));

        assert_eq!(&p.fetch(a).unwrap()[..], b"one");
        assert_eq!(&p.fetch(a).unwrap()[..], b"two");
        // `b` joined after "one" was published.
        assert_eq!(&p.fetch(b).unwrap()[..], b"two");
        assert_eq!(&p.fetch(b).unwrap()[..], b"three");
        assert_eq!(&p.fetch(a).unwrap()[..], b"three");
        assert!(p.fetch(a).unwrap().is_empty());
    }

    #[test]
    fn full_fifo_drops_oldest() {
        let p = pool(1, 2);
        let s = p.acquire().unwrap();
        for chunk in [&b"a"[..], b"b", b"c"] {
            p.publish(Bytes::copy_from_slice(chunk));
        }
        assert_eq!(p.dropped(s), Some(1));
        assert_eq!(&p.fetch(s).unwrap()[..], b"b");
        assert_eq!(&p.fetch(s).unwrap()[..], b"c");
    }

    #[test]
    fn reacquired_slot_starts_empty() {
        let p = pool(1, 4);
        let s = p.acquire().unwrap();
        p.publish(Bytes::from_static(b"stale"));
        p.release(s);
        let s = p.acquire().unwrap();
        assert!(p.fetch(s).unwrap().is_empty());
    }

    #[test]
    fn fetch_on_free_slot_is_unknown() {
        let p = pool(1, 4);
        assert!(matches!(p.fetch(SlotId(0)), Err(Error::UnknownSlot(0))));
        assert!(matches!(p.fetch(SlotId(5)), Err(Error::UnknownSlot(5))));
    }
}

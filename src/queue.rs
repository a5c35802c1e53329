//! Bounded MPMC queue (FIFO, fixed power-of-two capacity).
//!
//! Dmitry Vyukov's seqlock-slot bounded queue: each slot carries its own
//! sequence counter, so producers and consumers only ever contend on the
//! two position counters, not on each other's slots. `enqueue_pos` and
//! `dequeue_pos` are each cache-line padded to avoid false sharing between
//! the producer and consumer sides.

use alloc::boxed::Box;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::atomic::{AtomicUsize, Ordering};
use crate::retry::{RetryBudget, Transient};

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded multi-producer multi-consumer FIFO queue with compile-time
/// capacity `N`, which must be a power of two (`pos & (N - 1)` replaces a
/// division on the hot path).
pub struct MpmcQueue<T, const N: usize> {
    slots: Box<[Slot<T>]>,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

/// Distinguishes a full queue from a retry-budget exhaustion under extreme
/// contention, per the spec's error model (semantic failure vs. transient
/// failure are different outcomes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue has no free slot.
    Full,
    /// The bounded retry budget (64 attempts) was exhausted racing other
    /// producers for the same slot.
    Transient,
}

/// Mirrors [`EnqueueError`] for the consumer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueError {
    /// The queue has no committed value to hand out.
    Empty,
    /// The bounded retry budget was exhausted racing other consumers.
    Transient,
}

impl From<Transient> for EnqueueError {
    fn from(_: Transient) -> Self {
        EnqueueError::Transient
    }
}

impl From<Transient> for DequeueError {
    fn from(_: Transient) -> Self {
        DequeueError::Transient
    }
}

const RETRY_LIMIT: u32 = 64;

impl<T, const N: usize> MpmcQueue<T, N> {
    /// Create a new empty queue. Panics if `N` is zero or not a power of
    /// two.
    pub fn new() -> Self {
        assert!(N > 0 && N.is_power_of_two(), "N must be a power of 2");
        let mut slots = alloc::vec::Vec::with_capacity(N);
        for i in 0..N {
            slots.push(Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            });
        }
        Self {
            slots: slots.into_boxed_slice(),
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Fixed compile-time capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Enqueue `value`. The linearization point is the CAS on
    /// `enqueue_pos`.
    pub fn enqueue(&self, value: T) -> Result<(), EnqueueError> {
        let mut budget = RetryBudget::new(RETRY_LIMIT);
        loop {
            let pos = self.enqueue_pos.load(Ordering::Relaxed);
            let slot = &self.slots[pos & (N - 1)];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                if self
                    .enqueue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    unsafe {
                        (*slot.value.get()).write(value);
                    }
                    slot.sequence.store(pos + 1, Ordering::Release);
                    return Ok(());
                }
                // Lost the race for this slot; another producer claimed it.
                budget.step().map_err(EnqueueError::from)?;
            } else if diff < 0 {
                return Err(EnqueueError::Full);
            } else {
                // Another producer has already raced ahead of our stale
                // read of enqueue_pos; reload and try again without
                // counting it as a contended retry.
            }
        }
    }

    /// Dequeue the oldest committed value. The linearization point is the
    /// CAS on `dequeue_pos`.
    pub fn dequeue(&self) -> Result<T, DequeueError> {
        let mut budget = RetryBudget::new(RETRY_LIMIT);
        loop {
            let pos = self.dequeue_pos.load(Ordering::Relaxed);
            let slot = &self.slots[pos & (N - 1)];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos as isize + 1);

            if diff == 0 {
                if self
                    .dequeue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    let value = unsafe { (*slot.value.get()).assume_init_read() };
                    slot.sequence.store(pos + N, Ordering::Release);
                    return Ok(value);
                }
                budget.step().map_err(DequeueError::from)?;
            } else if diff < 0 {
                return Err(DequeueError::Empty);
            } else {
                // Stale read of dequeue_pos; reload.
            }
        }
    }

    /// Advisory peek at the next value to be dequeued.
    ///
    /// Racy by construction: the slot may be consumed by another thread
    /// between this read and the caller acting on it. Retained because it
    /// is a useful probe (e.g. "is anything pending"), not a commitment.
    pub fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        let pos = self.dequeue_pos.load(Ordering::Relaxed);
        let slot = &self.slots[pos & (N - 1)];
        let seq = slot.sequence.load(Ordering::Acquire);
        if seq == pos + 1 {
            Some(unsafe { (*slot.value.get()).assume_init_ref().clone() })
        } else {
            None
        }
    }

    /// Live element count. Computed from the position counters, which may
    /// be momentarily inconsistent under concurrent mutation; the result is
    /// clamped to `[0, N]`.
    pub fn size(&self) -> usize {
        let e = self.enqueue_pos.load(Ordering::Acquire);
        let d = self.dequeue_pos.load(Ordering::Acquire);
        e.saturating_sub(d).min(N)
    }

    /// True if no value is currently committed.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// True if every slot currently holds a committed value.
    pub fn is_full(&self) -> bool {
        self.size() >= N
    }
}

impl<T, const N: usize> Drop for MpmcQueue<T, N> {
    fn drop(&mut self) {
        while self.dequeue().is_ok() {}
    }
}

unsafe impl<T: Send, const N: usize> Send for MpmcQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MpmcQueue<T, N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_single_threaded() {
        let q: MpmcQueue<i32, 4> = MpmcQueue::new();
        assert!(q.enqueue(1).is_ok());
        assert!(q.enqueue(2).is_ok());
        assert!(q.enqueue(3).is_ok());
        assert_eq!(q.dequeue(), Ok(1));
        assert_eq!(q.dequeue(), Ok(2));
        assert_eq!(q.dequeue(), Ok(3));
        assert_eq!(q.dequeue(), Err(DequeueError::Empty));
    }

    #[test]
    fn full_is_distinct_from_transient() {
        let q: MpmcQueue<i32, 2> = MpmcQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert_eq!(q.enqueue(3), Err(EnqueueError::Full));
    }

    #[test]
    fn wrap_around_reuses_slots() {
        let q: MpmcQueue<i32, 2> = MpmcQueue::new();
        for round in 0..10 {
            q.enqueue(round).unwrap();
            q.enqueue(round + 100).unwrap();
            assert_eq!(q.dequeue(), Ok(round));
            assert_eq!(q.dequeue(), Ok(round + 100));
        }
    }

    #[test]
    fn size_tracks_occupancy() {
        let q: MpmcQueue<i32, 8> = MpmcQueue::new();
        assert!(q.is_empty());
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert_eq!(q.size(), 2);
        q.dequeue().unwrap();
        assert_eq!(q.size(), 1);
    }

    #[test]
    fn front_is_advisory() {
        let q: MpmcQueue<i32, 4> = MpmcQueue::new();
        assert_eq!(q.front(), None);
        q.enqueue(42).unwrap();
        assert_eq!(q.front(), Some(42));
        assert_eq!(q.size(), 1); // front does not consume
    }
}

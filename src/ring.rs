//! Concurrent ring buffer: an SPSC fast path plus an MPMC general path.
//!
//! The two are kept as separate types rather than one generalized
//! implementation because the single-producer/single-consumer path needs no
//! CAS at all — only the MPMC path pays for arbitrated slot claims. Mixing
//! producers or consumers on an [`SpscRing`] is undefined behavior by
//! contract, not detected at runtime; reach for [`MpmcRing`] when more than
//! one thread pushes or pops.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::retry::RetryBudget;

/// A single-producer, single-consumer ring buffer.
pub struct SpscRing<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl<T, const N: usize> SpscRing<T, N> {
    /// Create a new empty ring buffer.
    ///
    /// # Panics
    ///
    /// Panics if N is 0 or not a power of 2.
    pub fn new() -> Self {
        assert!(N > 0 && N.is_power_of_two(), "N must be a power of 2");
        Self {
            buffer: core::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Returns the capacity of the ring buffer.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1 // One slot is always empty to distinguish full from empty
    }

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Returns true if the buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + 1) & (N - 1) == head
    }

    /// Enqueue an item. Returns `Err(item)` if full.
    ///
    /// # Safety
    ///
    /// Must only be called from the producer thread.
    pub unsafe fn enqueue(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) & (N - 1);

        if next_tail == self.head.load(Ordering::Acquire) {
            return Err(item);
        }

        (*self.buffer[tail].get()).write(item);
        self.tail.store(next_tail, Ordering::Release);
        Ok(())
    }

    /// Dequeue an item. Returns `None` if empty.
    ///
    /// # Safety
    ///
    /// Must only be called from the consumer thread.
    pub unsafe fn dequeue(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        let item = (*self.buffer[head].get()).assume_init_read();
        let next_head = (head + 1) & (N - 1);
        self.head.store(next_head, Ordering::Release);
        Some(item)
    }
}

impl<T, const N: usize> Default for SpscRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: Ring is safe to send/sync if T is Send
unsafe impl<T: Send, const N: usize> Send for SpscRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscRing<T, N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let ring: SpscRing<i32, 16> = SpscRing::new();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
    }

    #[test]
    fn test_capacity() {
        let ring: SpscRing<i32, 16> = SpscRing::new();
        assert_eq!(ring.capacity(), 15);
    }

    #[test]
    fn test_enqueue_dequeue() {
        let ring: SpscRing<i32, 4> = SpscRing::new();

        unsafe {
            assert!(ring.enqueue(1).is_ok());
            assert!(ring.enqueue(2).is_ok());
            assert!(ring.enqueue(3).is_ok());
            assert!(ring.enqueue(4).is_err()); // Full

            assert_eq!(ring.dequeue(), Some(1));
            assert_eq!(ring.dequeue(), Some(2));
            assert_eq!(ring.dequeue(), Some(3));
            assert_eq!(ring.dequeue(), None);
        }
    }

    #[test]
    fn test_wrap_around() {
        let ring: SpscRing<i32, 4> = SpscRing::new();

        unsafe {
            // Fill and empty
            ring.enqueue(1).unwrap();
            ring.enqueue(2).unwrap();
            ring.enqueue(3).unwrap();
            ring.dequeue();
            ring.dequeue();
            ring.dequeue();

            // Fill again (wraps around)
            ring.enqueue(4).unwrap();
            ring.enqueue(5).unwrap();
            ring.enqueue(6).unwrap();

            assert_eq!(ring.dequeue(), Some(4));
            assert_eq!(ring.dequeue(), Some(5));
            assert_eq!(ring.dequeue(), Some(6));
        }
    }
}

struct MpmcSlot<T> {
    ptr: AtomicPtr<T>,
    valid: AtomicBool,
}

impl<T> MpmcSlot<T> {
    const fn empty() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            valid: AtomicBool::new(false),
        }
    }
}

const MPMC_RETRY_LIMIT: u32 = 256;

/// A general multi-producer multi-consumer ring buffer.
///
/// Each slot holds a heap pointer to a constructed value and a validity
/// flag; `head` and `tail` are each CAS-arbitrated claims on the next slot
/// to produce into / consume from. An explicit `size` counter, updated last
/// with relaxed ordering, backs a cheap [`MpmcRing::size`] query without an
/// O(n) scan.
pub struct MpmcRing<T, const N: usize> {
    slots: Box<[MpmcSlot<T>]>,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    size: CachePadded<AtomicUsize>,
}

/// Transient-vs-semantic failure split mirroring [`crate::queue::EnqueueError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPushError<T> {
    /// Every slot is currently occupied; the value is handed back.
    Full(T),
    /// The retry budget was exhausted racing other producers.
    Transient,
}

/// Mirrors [`RingPushError`] for the consumer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPopError {
    /// No slot currently holds a committed value.
    Empty,
    /// The retry budget was exhausted racing other consumers.
    Transient,
}

impl<T, const N: usize> MpmcRing<T, N> {
    /// Create a new empty ring. Panics if `N` is zero or not a power of two.
    pub fn new() -> Self {
        assert!(N > 0 && N.is_power_of_two(), "N must be a power of 2");
        let mut slots = Vec::with_capacity(N);
        for _ in 0..N {
            slots.push(MpmcSlot::empty());
        }
        Self {
            slots: slots.into_boxed_slice(),
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            size: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Fixed compile-time capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Push `value` into the ring.
    pub fn push(&self, value: T) -> Result<(), RingPushError<T>> {
        let mut budget = RetryBudget::new(MPMC_RETRY_LIMIT);
        let boxed = Box::into_raw(Box::new(value));
        loop {
            let h = self.head.load(Ordering::Relaxed);
            let slot = &self.slots[h & (N - 1)];
            if slot.valid.load(Ordering::Acquire) {
                // Slot still occupied by an unconsumed value: the ring is
                // full from this producer's point of view.
                let value = unsafe { *Box::from_raw(boxed) };
                return Err(RingPushError::Full(value));
            }
            if self
                .head
                .compare_exchange_weak(h, h + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                slot.ptr.store(boxed, Ordering::Release);
                slot.valid.store(true, Ordering::Release);
                self.size.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            if budget.step().is_err() {
                let value = unsafe { *Box::from_raw(boxed) };
                return Err(RingPushError::Transient);
            }
        }
    }

    /// Pop the oldest committed value.
    pub fn pop(&self) -> Result<T, RingPopError> {
        let mut budget = RetryBudget::new(MPMC_RETRY_LIMIT);
        loop {
            let t = self.tail.load(Ordering::Relaxed);
            let slot = &self.slots[t & (N - 1)];
            if !slot.valid.load(Ordering::Acquire) {
                return Err(RingPopError::Empty);
            }
            if self
                .tail
                .compare_exchange_weak(t, t + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let ptr = slot.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
                slot.valid.store(false, Ordering::Release);
                self.size.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: ptr was published by a push that set valid=true
                // before any pop can observe it, and each slot's value is
                // claimed by exactly one pop (the tail CAS above).
                return Ok(unsafe { *Box::from_raw(ptr) });
            }
            if budget.step().is_err() {
                return Err(RingPopError::Transient);
            }
        }
    }

    /// Live element count via the explicit counter (relaxed, so it may lag
    /// momentarily under concurrent mutation).
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// True if no slot currently holds a committed value.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// True if every slot currently holds a committed value.
    pub fn is_full(&self) -> bool {
        self.size() >= N
    }
}

impl<T, const N: usize> Drop for MpmcRing<T, N> {
    fn drop(&mut self) {
        while self.pop().is_ok() {}
    }
}

unsafe impl<T: Send, const N: usize> Send for MpmcRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MpmcRing<T, N> {}

#[cfg(test)]
mod mpmc_tests {
    use super::*;
    use alloc::vec::Vec as AVec;

    #[test]
    fn push_pop_fifo() {
        let r: MpmcRing<i32, 4> = MpmcRing::new();
        r.push(1).unwrap();
        r.push(2).unwrap();
        assert_eq!(r.pop(), Ok(1));
        assert_eq!(r.pop(), Ok(2));
        assert_eq!(r.pop(), Err(RingPopError::Empty));
    }

    #[test]
    fn full_returns_value() {
        let r: MpmcRing<i32, 2> = MpmcRing::new();
        r.push(1).unwrap();
        r.push(2).unwrap();
        match r.push(3) {
            Err(RingPushError::Full(v)) => assert_eq!(v, 3),
            other => panic!("expected Full, got {:?}", other),
        }
    }

    #[test]
    fn wrap_around() {
        let r: MpmcRing<i32, 2> = MpmcRing::new();
        let mut out = AVec::new();
        for i in 0..8 {
            r.push(i).unwrap();
            out.push(r.pop().unwrap());
        }
        assert_eq!(out, (0..8).collect::<AVec<_>>());
    }

    #[test]
    fn size_tracks_occupancy() {
        let r: MpmcRing<i32, 8> = MpmcRing::new();
        assert!(r.is_empty());
        r.push(1).unwrap();
        r.push(2).unwrap();
        assert_eq!(r.size(), 2);
        r.pop().unwrap();
        assert_eq!(r.size(), 1);
    }
}

//! Atomic types switched between `core` and `loom`.
//!
//! [`tag::TaggedPtr`](crate::tag::TaggedPtr) and
//! [`queue::MpmcQueue`](crate::queue::MpmcQueue) are the two structures
//! whose CAS discipline is subtle enough to warrant exhaustive interleaving
//! checks (see `tests/loom_stack_queue.rs`). Built against `core`'s atomics
//! directly, `loom::model` would only ever explore the one schedule the
//! hardware happens to run; built against these re-exports, a `--cfg loom`
//! build swaps in `loom`'s instrumented atomics and `loom::model` explores
//! every interleaving the model checker can reach instead.
//!
//! `loom` has no `std`-free mode, so a `--cfg loom` build also drops this
//! crate's `#![no_std]` attribute (see `lib.rs`); ordinary builds never pull
//! in `loom` at all.

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

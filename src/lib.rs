//! # Concurrency Kit (CK) - Rust Implementation
//!
//! A library of non-blocking concurrent containers for shared-memory,
//! multi-threaded programs, ported from the
//! [Concurrency Kit](http://concurrencykit.org/) C library's lock-free
//! extensions.
//!
//! None of these containers are wait-free: every operation is built on a
//! bounded compare-and-swap retry loop with progressive backoff (see
//! [`retry`]), and a caller can in principle observe a transient failure
//! under sustained contention. None of them reclaim memory on logical
//! deletion either — nodes are unlinked from traversal but not freed until
//! the container itself is dropped, since safe concurrent reclamation
//! (hazard pointers, epochs, RCU) is out of scope here. Destroying a
//! container while another thread still holds a reference to it is
//! undefined behavior, exactly as it is for the C library this crate is
//! ported from.
//!
//! ## Module Organization
//!
//! ### Foundation
//! - [`cc`] - Compiler compatibility utilities (bit operations, branch hints)
//! - [`malloc`] - Memory allocator abstraction
//! - [`pr`] - Atomic primitives and memory barriers
//!
//! ### Concurrency Substrate
//! - [`mod@backoff`] - Exponential backoff for contention management
//! - [`retry`] - Bounded CAS retry budgets with progressive backoff
//! - [`tag`] - Tagged pointers for ABA-safe lock-free linked structures
//! - [`rng`] - `no_std` pseudo-random level generation for skip-lists
//! - [`hash`] - Shared hashing helper for the chained map and set
//! - [`bitmap`] - Concurrent bitmap operations
//!
//! ### Containers
//! - [`stack`] - Lock-free Treiber stack
//! - [`queue`] - Bounded MPMC queue (Vyukov seqlock-slot scheme)
//! - [`ring`] - SPSC and MPMC ring buffers
//! - [`map`] - Hash-chained concurrent map
//! - [`set`] - Hash-chained concurrent set
//! - [`list`] - Mark-deletion singly-linked list
//! - [`skiplist`] - Atomic skip-list ordered map
//! - [`rbtree`] - Red-black-keyed store (BST, no rebalancing)
//! - [`pqueue`] - Skip-list-based priority queue
//! - [`trie`] - 256-child-array prefix trie
//! - [`bloom`] - Bit-array Bloom filter

#![cfg_attr(not(loom), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_inception)]

extern crate alloc;

// Internal only: lets `tag` and `queue` run under `loom::model` in
// `tests/loom_stack_queue.rs` without leaking loom's types into the public
// API. See the module doc comment in `atomic.rs`.
mod atomic;

// =============================================================================
// Foundation
// =============================================================================

/// Compiler compatibility utilities.
///
/// Provides bit manipulation operations (ffs, ctz, popcount) and branch prediction hints.
pub mod cc;

/// Memory allocator abstraction.
///
/// Defines the [`Allocator`](malloc::Allocator) trait for custom memory allocation.
pub mod malloc;

/// Atomic primitives and memory barriers.
///
/// Provides atomic operations with various memory orderings.
pub mod pr;

// =============================================================================
// Concurrency substrate
// =============================================================================

/// Exponential backoff for contention management.
pub mod backoff;

/// Bounded CAS retry budgets with progressive backoff.
pub mod retry;

/// Tagged pointers for ABA-safe lock-free linked structures.
pub mod tag;

/// `no_std` pseudo-random level generation for skip-lists.
pub mod rng;

/// Shared hashing helper for the chained map and set.
pub mod hash;

/// Concurrent bitmap operations.
pub mod bitmap;

// =============================================================================
// Containers
// =============================================================================

/// Lock-free Treiber stack.
pub mod stack;

/// Bounded MPMC queue.
pub mod queue;

/// SPSC and MPMC ring buffers.
pub mod ring;

/// Hash-chained concurrent map.
pub mod map;

/// Hash-chained concurrent set.
pub mod set;

/// Mark-deletion singly-linked list.
pub mod list;

/// Atomic skip-list ordered map.
pub mod skiplist;

/// Red-black-keyed store.
pub mod rbtree;

/// Skip-list-based priority queue.
pub mod pqueue;

/// 256-child-array prefix trie.
pub mod trie;

/// Bit-array Bloom filter.
pub mod bloom;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use cc::{ctz, ffs, ffsl, ffsll, popcount};
pub use malloc::Allocator;

pub use bloom::BloomFilter;
pub use list::List;
pub use map::HashMap;
pub use pqueue::PriorityQueue;
pub use queue::MpmcQueue;
pub use rbtree::RbTree;
pub use ring::{MpmcRing, SpscRing};
pub use set::HashSet;
pub use skiplist::SkipList;
pub use stack::Stack;
pub use trie::Trie;

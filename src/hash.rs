//! Shared hashing helper for the chained map and set.
//!
//! `#![no_std]` rules out `std::collections::hash_map::DefaultHasher` (it
//! lives in `std`, not `core`), and pulling in a third-party hasher crate
//! buys little for a bucket-index computation with no adversarial-input
//! requirement. Instead this is the same multiplicative byte-at-a-time
//! hasher the source's single-writer hash containers already used
//! internally, generalized into one shared helper instead of being
//! duplicated per container.

use core::hash::{Hash, Hasher};

#[derive(Default)]
struct ChainHasher {
    state: u64,
}

impl Hasher for ChainHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = self.state.wrapping_mul(31).wrapping_add(byte as u64);
        }
    }
}

/// Hash `value` for bucket placement.
pub fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = ChainHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Map a hash to a bucket index. `bucket_count` need not be a power of two
/// (hash containers are sized at construction, not required to be
/// power-of-two like the queue/ring capacities), so this uses a modulus
/// rather than a mask.
#[inline]
pub fn bucket_index(hash: u64, bucket_count: usize) -> usize {
    (hash as usize) % bucket_count
}

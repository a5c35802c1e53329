//! Bit-array Bloom filter.
//!
//! `SIZE_BITS` backing bits (required power-of-two, packed 64 to an
//! `AtomicU64` word) and `NUM_HASHES` hash functions (1-8), each derived by
//! XORing one base hash with a fixed per-slot seed constant rather than
//! computing `NUM_HASHES` independent hashes — the double/triple-hashing
//! trick common to Bloom filter implementations that need several
//! well-distributed indices from a single hash computation.
//!
//! `insert`/`contains` are lock-free (`fetch_or`/`load` on the backing
//! words); `clear` is not thread-safe against concurrent `insert` or
//! `contains` and must not be called while other threads may be touching
//! the filter.

use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};

/// Fixed XOR-mixing seeds used to derive up to 8 independent-ish hash
/// values from one base hash, avoiding 8 separate hash computations per
/// operation.
const SEEDS: [u64; 8] = [
    0x9e3779b97f4a7c15,
    0xbf58476d1ce4e5b9,
    0x94d049bb133111eb,
    0xff51afd7ed558ccd,
    0xc4ceb9fe1a85ec53,
    0x2545f4914f6cdd1d,
    0x27d4eb2f165667c5,
    0x85ebca6b,
];

#[derive(Default)]
struct MixHasher {
    state: u64,
}

impl Hasher for MixHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = self.state.wrapping_mul(0x100000001b3).wrapping_add(byte as u64);
        }
    }
}

fn base_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = MixHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A fixed-capacity, const-generic Bloom filter.
///
/// `SIZE_BITS` must be a power of two (enforced in [`BloomFilter::new`]);
/// `NUM_HASHES` must be between 1 and 8 inclusive.
pub struct BloomFilter<const SIZE_BITS: usize, const NUM_HASHES: usize> {
    bits: alloc::boxed::Box<[AtomicU64]>,
}

const WORD_BITS: usize = 64;

impl<const SIZE_BITS: usize, const NUM_HASHES: usize> BloomFilter<SIZE_BITS, NUM_HASHES> {
    /// Create a new, empty filter.
    pub fn new() -> Self {
        assert!(SIZE_BITS > 0 && SIZE_BITS.is_power_of_two(), "SIZE_BITS must be a power of two");
        assert!(
            NUM_HASHES >= 1 && NUM_HASHES <= 8,
            "NUM_HASHES must be between 1 and 8"
        );
        let words = SIZE_BITS.div_ceil(WORD_BITS);
        let mut bits = alloc::vec::Vec::with_capacity(words);
        for _ in 0..words {
            bits.push(AtomicU64::new(0));
        }
        Self {
            bits: bits.into_boxed_slice(),
        }
    }

    fn bit_index(&self, hash: u64) -> usize {
        (hash as usize) & (SIZE_BITS - 1)
    }

    /// Insert `value`, setting its `NUM_HASHES` bit positions. Returns
    /// `true` if at least one of those bits was previously zero ("probably
    /// new"); `false` means every bit was already set, so `value` (or a
    /// colliding combination of prior inserts) was probably already
    /// present.
    pub fn insert<T: Hash + ?Sized>(&self, value: &T) -> bool {
        let base = base_hash(value);
        let mut was_new = false;
        for seed in &SEEDS[..NUM_HASHES] {
            let idx = self.bit_index(base ^ seed);
            let word = idx / WORD_BITS;
            let bit = idx % WORD_BITS;
            let mask = 1u64 << bit;
            let prev = self.bits[word].fetch_or(mask, Ordering::Relaxed);
            if prev & mask == 0 {
                was_new = true;
            }
        }
        was_new
    }

    /// Test whether `value` may have been inserted. `false` is a certain
    /// negative; `true` may be a false positive.
    pub fn contains<T: Hash + ?Sized>(&self, value: &T) -> bool {
        let base = base_hash(value);
        for seed in &SEEDS[..NUM_HASHES] {
            let idx = self.bit_index(base ^ seed);
            let word = idx / WORD_BITS;
            let bit = idx % WORD_BITS;
            if self.bits[word].load(Ordering::Relaxed) & (1u64 << bit) == 0 {
                return false;
            }
        }
        true
    }

    /// Reset every bit to zero. Not thread-safe against concurrent
    /// `insert`/`contains` on this filter.
    pub fn clear(&self) {
        for word in self.bits.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Number of bits currently set.
    pub fn bits_set(&self) -> usize {
        self.bits
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Fraction of bits currently set, in `[0.0, 1.0]`.
    pub fn load_factor(&self) -> f64 {
        self.bits_set() as f64 / SIZE_BITS as f64
    }

    /// Estimated false-positive probability at the filter's current load,
    /// via the standard `(1 - e^(-k*n/m))^k` approximation, substituting
    /// the observed `load_factor` for `1 - e^(-k*n/m)`.
    pub fn false_positive_probability(&self) -> f64 {
        libm_powf(self.load_factor(), NUM_HASHES as i32)
    }

    /// The number of hash functions, for a target `expected_items`, that
    /// minimizes the false-positive rate for this filter's fixed
    /// `SIZE_BITS`: `k = (m/n) * ln(2)`, rounded to the nearest integer and
    /// clamped to `[1, 8]`.
    pub fn optimal_hash_functions(expected_items: usize) -> usize {
        if expected_items == 0 {
            return 8;
        }
        let ratio = SIZE_BITS as f64 / expected_items as f64;
        let k = libm_roundf(ratio * core::f64::consts::LN_2) as i64;
        k.clamp(1, 8) as usize
    }

    /// The expected false-positive rate for `expected_items` inserted into
    /// a filter of this size using `NUM_HASHES` hash functions, via the
    /// standard asymptotic Bloom filter formula.
    pub fn expected_false_positive_rate(expected_items: usize) -> f64 {
        let m = SIZE_BITS as f64;
        let n = expected_items as f64;
        let k = NUM_HASHES as f64;
        let exponent = -(k * n) / m;
        libm_powf(1.0 - libm_expf(exponent), NUM_HASHES as i32)
    }

    /// A snapshot of this filter's occupancy and estimated accuracy,
    /// bundling [`bits_set`](Self::bits_set), [`load_factor`](Self::load_factor)
    /// and [`false_positive_probability`](Self::false_positive_probability)
    /// with the item count the current bit occupancy implies.
    pub fn statistics(&self) -> Statistics {
        let bits_set = self.bits_set();
        Statistics {
            total_bits: SIZE_BITS,
            bits_set,
            approximate_items: Self::approximate_item_count(bits_set),
            hash_functions: NUM_HASHES,
            load_factor: self.load_factor(),
            false_positive_probability: self.false_positive_probability(),
        }
    }

    /// Estimate the number of distinct items inserted from `bits_set`, via
    /// `n ≈ -(m/k) * ln(1 - bits_set/m)`, the standard inversion of the
    /// expected-bits-set formula.
    fn approximate_item_count(bits_set: usize) -> usize {
        if bits_set == 0 {
            return 0;
        }
        if bits_set >= SIZE_BITS {
            return usize::MAX;
        }
        let m = SIZE_BITS as f64;
        let k = NUM_HASHES as f64;
        let remaining_fraction = 1.0 - (bits_set as f64 / m);
        let estimate = -(m / k) * libm_lnf(remaining_fraction);
        if estimate.is_finite() && estimate >= 0.0 {
            libm_roundf(estimate) as usize
        } else {
            usize::MAX
        }
    }
}

/// A point-in-time summary of a filter's occupancy and estimated accuracy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Total backing bit count (`SIZE_BITS`).
    pub total_bits: usize,
    /// Bits currently set.
    pub bits_set: usize,
    /// Estimated distinct items inserted, derived from `bits_set`.
    pub approximate_items: usize,
    /// Hash functions per operation (`NUM_HASHES`).
    pub hash_functions: usize,
    /// `bits_set / total_bits`.
    pub load_factor: f64,
    /// Estimated false-positive probability at the current load.
    pub false_positive_probability: f64,
}

/// Minimal no_std integer-exponent power, since `f64::powi` requires
/// `std`'s libm bindings to be linked in on some targets; raising a value
/// already in `[0, 1]` to a small integer power by repeated squaring needs
/// no transcendental support.
fn libm_powf(base: f64, exp: i32) -> f64 {
    let mut result = 1.0f64;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result *= b;
        }
        b *= b;
        e >>= 1;
    }
    result
}

/// Minimal no_std natural-exponential via a Taylor series, sufficient for
/// the small negative exponents `expected_false_positive_rate` evaluates.
fn libm_expf(x: f64) -> f64 {
    let mut term = 1.0f64;
    let mut sum = 1.0f64;
    for n in 1..30 {
        term *= x / (n as f64);
        sum += term;
    }
    sum
}

/// Minimal no_std natural log for `x > 0`, via range reduction into `[0.5,
/// 1.0)` by powers of two followed by a Taylor series for `ln(1 + u)`.
/// Sufficient for `approximate_item_count`'s `1 - load_factor` argument,
/// which only ever needs a handful of significant digits.
/// Minimal no_std round-half-away-from-zero, since `f64::round` is a
/// `std`-only inherent method; truncating cast after the appropriate
/// half-unit offset gives the same result for the finite, moderate-magnitude
/// values this module ever rounds.
fn libm_roundf(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5) as i64 as f64
    } else {
        (x - 0.5) as i64 as f64
    }
}

fn libm_lnf(x: f64) -> f64 {
    let mut x = x;
    let mut exponent = 0i32;
    while x < 0.5 {
        x *= 2.0;
        exponent -= 1;
    }
    while x >= 1.0 {
        x /= 2.0;
        exponent += 1;
    }
    let u = x - 1.0;
    let mut term = u;
    let mut sum = 0.0f64;
    let mut sign = 1.0f64;
    for n in 1..40 {
        sum += sign * term / (n as f64);
        term *= u;
        sign = -sign;
    }
    sum + (exponent as f64) * core::f64::consts::LN_2
}

impl<const SIZE_BITS: usize, const NUM_HASHES: usize> Default
    for BloomFilter<SIZE_BITS, NUM_HASHES>
{
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const SIZE_BITS: usize, const NUM_HASHES: usize> Send
    for BloomFilter<SIZE_BITS, NUM_HASHES>
{
}
unsafe impl<const SIZE_BITS: usize, const NUM_HASHES: usize> Sync
    for BloomFilter<SIZE_BITS, NUM_HASHES>
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let filter: BloomFilter<1024, 4> = BloomFilter::new();
        for i in 0..100i32 {
            filter.insert(&i);
        }
        for i in 0..100i32 {
            assert!(filter.contains(&i));
        }
    }

    #[test]
    fn absent_values_mostly_negative() {
        let filter: BloomFilter<4096, 4> = BloomFilter::new();
        for i in 0..50i32 {
            filter.insert(&i);
        }
        let mut false_positives = 0;
        for i in 1000..2000i32 {
            if filter.contains(&i) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 50, "unexpectedly high false-positive rate");
    }

    #[test]
    fn clear_resets_bits() {
        let filter: BloomFilter<256, 2> = BloomFilter::new();
        filter.insert(&"hello");
        assert!(filter.bits_set() > 0);
        filter.clear();
        assert_eq!(filter.bits_set(), 0);
        assert!(!filter.contains(&"hello"));
    }

    #[test]
    fn optimal_hash_functions_in_range() {
        let k = BloomFilter::<1024, 4>::optimal_hash_functions(100);
        assert!((1..=8).contains(&k));
    }

    #[test]
    fn load_factor_increases_with_inserts() {
        let filter: BloomFilter<1024, 3> = BloomFilter::new();
        let before = filter.load_factor();
        for i in 0..20i32 {
            filter.insert(&i);
        }
        assert!(filter.load_factor() > before);
    }

    #[test]
    fn insert_reports_whether_any_bit_was_new() {
        let filter: BloomFilter<1024, 3> = BloomFilter::new();
        assert!(filter.insert(&"first"));
        // Re-inserting the same value sets no new bits.
        assert!(!filter.insert(&"first"));
    }

    #[test]
    fn statistics_reports_snapshot() {
        let filter: BloomFilter<4096, 4> = BloomFilter::new();
        for i in 0..100i32 {
            filter.insert(&i);
        }
        let stats = filter.statistics();
        assert_eq!(stats.total_bits, 4096);
        assert_eq!(stats.hash_functions, 4);
        assert_eq!(stats.bits_set, filter.bits_set());
        assert!((stats.load_factor - filter.load_factor()).abs() < f64::EPSILON);
        assert!(stats.approximate_items > 0);
        // Roughly in the right ballpark, not exact: the estimator is a
        // statistical inversion, not a count.
        assert!(stats.approximate_items < 300);
    }
}

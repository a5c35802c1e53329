//! Property-based checks for the spec's universal invariants (P1-P6),
//! single-threaded: these exercise sequences of operations against a
//! reference model rather than concurrency itself, which `loom_stack_queue`
//! and `concurrent_scenarios` cover separately.

use proptest::prelude::*;

use concurrencykit::{BloomFilter, HashMap, SkipList, Stack};

proptest! {
    // P5: LIFO preservation under a single producer/consumer.
    #[test]
    fn stack_is_lifo(values in prop::collection::vec(any::<i32>(), 0..200)) {
        let stack = Stack::new();
        for &v in &values {
            stack.push(v);
        }
        let mut popped = Vec::new();
        while let Some(v) = stack.pop() {
            popped.push(v);
        }
        let mut expected = values.clone();
        expected.reverse();
        prop_assert_eq!(popped, expected);
    }

    // P2: no phantom inserts for the hash map (exact equality; single
    // threaded, so the §4.4 transient-duplicate allowance never triggers).
    #[test]
    fn hash_map_size_matches_net_inserts(
        keys in prop::collection::vec(0..50i32, 0..300)
    ) {
        let map: HashMap<i32, i32> = HashMap::with_buckets(32);
        let mut live = std::collections::HashSet::new();
        for k in keys {
            if map.insert(k, k).eq(&concurrencykit::map::InsertOutcome::Inserted) {
                live.insert(k);
            }
            if k % 7 == 0 {
                if map.erase(&k) {
                    live.remove(&k);
                }
            }
        }
        prop_assert_eq!(map.size(), live.len());
    }

    // P6: ordered traversal for the skip-list, skipping marked nodes.
    #[test]
    fn skiplist_iterates_in_ascending_order(
        keys in prop::collection::hash_set(-500..500i32, 0..200)
    ) {
        let list: SkipList<i32, i32> = SkipList::new();
        for &k in &keys {
            list.insert(k, k);
        }
        let mut out = Vec::new();
        list.for_each(|k, _| out.push(*k));
        let mut sorted = out.clone();
        sorted.sort_unstable();
        prop_assert_eq!(out, sorted);
    }

    // P3: Bloom filter never produces a false negative for an inserted
    // value, regardless of what else was inserted alongside it.
    #[test]
    fn bloom_filter_no_false_negatives(
        values in prop::collection::vec(any::<i64>(), 1..200)
    ) {
        let filter: BloomFilter<4096, 4> = BloomFilter::new();
        for &v in &values {
            filter.insert(&v);
        }
        for &v in &values {
            prop_assert!(filter.contains(&v));
        }
    }
}

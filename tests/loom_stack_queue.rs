//! Exhaustive interleaving checks for the two containers with the tightest
//! linearization-point discipline: the stack's tagged-pointer CAS and the
//! bounded queue's seqlock-slot CAS. Only runs under `loom`:
//!
//! ```text
//! RUSTFLAGS="--cfg loom" cargo test --test loom_stack_queue
//! ```
//!
//! Ordinary `cargo test` runs skip this file entirely via the outer
//! `#[cfg(loom)]`.

#![cfg(loom)]

use std::sync::Arc;

use concurrencykit::{MpmcQueue, Stack};

#[test]
fn loom_stack_two_pushers_one_popper() {
    loom::model(|| {
        let stack = Arc::new(Stack::new());
        let s1 = Arc::clone(&stack);
        let s2 = Arc::clone(&stack);

        let t1 = loom::thread::spawn(move || s1.push(1));
        let t2 = loom::thread::spawn(move || s2.push(2));
        t1.join().unwrap();
        t2.join().unwrap();

        let mut seen = Vec::new();
        while let Some(v) = stack.pop() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
    });
}

#[test]
fn loom_queue_two_producers_two_consumers() {
    loom::model(|| {
        let queue: Arc<MpmcQueue<i32, 4>> = Arc::new(MpmcQueue::new());
        let q1 = Arc::clone(&queue);
        let q2 = Arc::clone(&queue);

        let p1 = loom::thread::spawn(move || q1.enqueue(1));
        let p2 = loom::thread::spawn(move || q2.enqueue(2));
        p1.join().unwrap();
        p2.join().unwrap();

        let mut seen = Vec::new();
        while let Ok(v) = queue.dequeue() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
    });
}

//! Red-black-keyed store.
//!
//! A concurrent binary search tree that carries a [`Color`] field per node
//! but performs none of the rotations that would keep a real red-black tree
//! balanced — only the root is forced black, at construction of the very
//! first node. The name describes the node layout the source carries
//! forward, not a balancing guarantee; under adversarial insertion order
//! this degrades to a linked list. Documented here rather than "fixed",
//! since matching the source's behavior is the point.
//!
//! Erase is logical-deletion-only: unlike every other container in this
//! crate, nodes are never physically unlinked, even opportunistically,
//! because unlinking an internal BST node without rotations risks
//! disconnecting a whole subtree. Marked nodes accumulate until the tree is
//! dropped.

use alloc::boxed::Box;
use core::cmp::Ordering as CmpOrdering;
use core::hash::Hash;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

use crate::retry::RetryBudget;

const INSERT_RETRY_LIMIT: u32 = 1000;

/// Per-node color. Carried for structural fidelity; this container performs
/// no rotations, so the invariant a real red-black tree relies on (no two
/// consecutive red nodes, equal black-height on every root-to-leaf path) is
/// not maintained past construction of the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    left: AtomicPtr<Node<K, V>>,
    right: AtomicPtr<Node<K, V>>,
    deleted: AtomicBool,
}

/// Outcome of [`RbTree::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
    Transient,
}

/// An ordered key-value BST with a vestigial color field and no rebalancing.
pub struct RbTree<K, V> {
    root: AtomicPtr<Node<K, V>>,
    size: AtomicUsize,
}

impl<K: Ord + Hash, V> RbTree<K, V> {
    /// Create a new empty tree.
    pub const fn new() -> Self {
        Self {
            root: AtomicPtr::new(core::ptr::null_mut()),
            size: AtomicUsize::new(0),
        }
    }

    /// Insert `key`/`value`. Duplicate live keys are rejected, preserving
    /// the existing value, matching [`crate::map::HashMap::insert`]'s
    /// open-question resolution.
    pub fn insert(&self, key: K, value: V) -> InsertOutcome {
        let mut budget = RetryBudget::new(INSERT_RETRY_LIMIT);
        loop {
            let root = self.root.load(Ordering::Acquire);
            if root.is_null() {
                let node = Box::into_raw(Box::new(Node {
                    key,
                    value,
                    color: Color::Black,
                    left: AtomicPtr::new(core::ptr::null_mut()),
                    right: AtomicPtr::new(core::ptr::null_mut()),
                    deleted: AtomicBool::new(false),
                }));
                if self
                    .root
                    .compare_exchange(
                        core::ptr::null_mut(),
                        node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    self.size.fetch_add(1, Ordering::Relaxed);
                    return InsertOutcome::Inserted;
                }
                let Node { key: k, value: v, .. } = *unsafe { Box::from_raw(node) };
                return self.insert_below(root, k, v, &mut budget);
            }
            return self.insert_below(root, key, value, &mut budget);
        }
    }

    /// Descend from `current` (always non-null: the caller has already
    /// handled the empty-tree case) inserting `key`/`value` into the first
    /// empty child slot found.
    fn insert_below(
        &self,
        mut current: *mut Node<K, V>,
        key: K,
        value: V,
        budget: &mut RetryBudget,
    ) -> InsertOutcome {
        let mut key = key;
        let mut value = value;
        loop {
            let node = unsafe { &*current };
            match key.cmp(&node.key) {
                // A slot for this key already exists, live or deleted;
                // resurrection in place is not supported (see module docs
                // on erase), so an exact key match is always "already
                // exists", matching map.rs/list.rs's treatment of inserting
                // over a logically deleted entry.
                CmpOrdering::Equal => return InsertOutcome::AlreadyPresent,
                CmpOrdering::Less => {
                    let slot = &node.left;
                    let next = slot.load(Ordering::Acquire);
                    if next.is_null() {
                        let new_node = Box::into_raw(Box::new(Node {
                            key,
                            value,
                            color: Color::Red,
                            left: AtomicPtr::new(core::ptr::null_mut()),
                            right: AtomicPtr::new(core::ptr::null_mut()),
                            deleted: AtomicBool::new(false),
                        }));
                        if slot
                            .compare_exchange(
                                core::ptr::null_mut(),
                                new_node,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            self.size.fetch_add(1, Ordering::Relaxed);
                            return InsertOutcome::Inserted;
                        }
                        let Node { key: k, value: v, .. } =
                            *unsafe { Box::from_raw(new_node) };
                        key = k;
                        value = v;
                        if budget.step().is_err() {
                            return InsertOutcome::Transient;
                        }
                        continue;
                    }
                    current = next;
                }
                CmpOrdering::Greater => {
                    let slot = &node.right;
                    let next = slot.load(Ordering::Acquire);
                    if next.is_null() {
                        let new_node = Box::into_raw(Box::new(Node {
                            key,
                            value,
                            color: Color::Red,
                            left: AtomicPtr::new(core::ptr::null_mut()),
                            right: AtomicPtr::new(core::ptr::null_mut()),
                            deleted: AtomicBool::new(false),
                        }));
                        if slot
                            .compare_exchange(
                                core::ptr::null_mut(),
                                new_node,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            self.size.fetch_add(1, Ordering::Relaxed);
                            return InsertOutcome::Inserted;
                        }
                        let Node { key: k, value: v, .. } =
                            *unsafe { Box::from_raw(new_node) };
                        key = k;
                        value = v;
                        if budget.step().is_err() {
                            return InsertOutcome::Transient;
                        }
                        continue;
                    }
                    current = next;
                }
            }
        }
    }

    fn find_node(&self, key: &K) -> *const Node<K, V> {
        let mut current = self.root.load(Ordering::Acquire);
        while !current.is_null() {
            let node = unsafe { &*current };
            match key.cmp(&node.key) {
                CmpOrdering::Equal => {
                    return if node.deleted.load(Ordering::Acquire) {
                        core::ptr::null()
                    } else {
                        current
                    };
                }
                CmpOrdering::Less => current = node.left.load(Ordering::Acquire),
                CmpOrdering::Greater => current = node.right.load(Ordering::Acquire),
            }
        }
        core::ptr::null()
    }

    /// Look up `key`, returning a clone of the value if a live entry
    /// exists.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let node = self.find_node(key);
        if node.is_null() {
            None
        } else {
            Some(unsafe { (*node).value.clone() })
        }
    }

    /// True if a live entry equal to `key` exists.
    pub fn contains(&self, key: &K) -> bool {
        !self.find_node(key).is_null()
    }

    /// Mark `key`'s entry deleted. No physical unlink is ever performed —
    /// see module docs. Returns `true` if a live entry was found and
    /// marked.
    pub fn erase(&self, key: &K) -> bool {
        let node = self.find_node(key);
        if node.is_null() {
            return false;
        }
        let deleted = unsafe { &(*node).deleted };
        if deleted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.size.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Live entry count.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// True if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Visit every live key/value pair in ascending key order (in-order
    /// traversal).
    pub fn for_each<F: FnMut(&K, &V)>(&self, mut f: F) {
        fn visit<K, V, F: FnMut(&K, &V)>(node: *mut Node<K, V>, f: &mut F) {
            if node.is_null() {
                return;
            }
            let n = unsafe { &*node };
            visit(n.left.load(Ordering::Acquire), f);
            if !n.deleted.load(Ordering::Acquire) {
                f(&n.key, &n.value);
            }
            visit(n.right.load(Ordering::Acquire), f);
        }
        visit(self.root.load(Ordering::Acquire), &mut f);
    }

    /// The root's color. Always [`Color::Black`] once the tree is
    /// non-empty, since only the first inserted node is ever forced black
    /// and nothing ever replaces the root afterward.
    pub fn root_color(&self) -> Option<Color> {
        let root = self.root.load(Ordering::Acquire);
        if root.is_null() {
            None
        } else {
            Some(unsafe { (*root).color })
        }
    }
}

impl<K: Ord + Hash, V> Default for RbTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for RbTree<K, V> {
    fn drop(&mut self) {
        fn free<K, V>(node: *mut Node<K, V>) {
            if node.is_null() {
                return;
            }
            let boxed = unsafe { Box::from_raw(node) };
            free(boxed.left.load(Ordering::Relaxed));
            free(boxed.right.load(Ordering::Relaxed));
        }
        free(*self.root.get_mut());
    }
}

unsafe impl<K: Send, V: Send> Send for RbTree<K, V> {}
unsafe impl<K: Send, V: Send> Sync for RbTree<K, V> {}

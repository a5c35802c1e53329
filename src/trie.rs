//! 256-child-array prefix trie.
//!
//! Every node carries a full `[AtomicPtr<Node>; 256]` child array, indexed
//! directly by byte value — no sparse representation, trading memory for
//! branch-free child lookup. `end_of_word`/`deleted` are independent flags:
//! a node can be a live prefix (has live descendants) while its own
//! `end_of_word` is false, or vice versa after a logical delete. Unlike
//! every other container here, `erase` opportunistically prunes childless,
//! non-end-of-word nodes bottom-up — the trie is the one structure where a
//! node with no remaining purpose can be safely unlinked without disturbing
//! a linearization point, since no concurrent search can be "inside" an
//! already-abandoned subtree without also holding a reference through its
//! still-live parent.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

const ALPHABET_SIZE: usize = 256;

struct Node {
    children: Box<[AtomicPtr<Node>; ALPHABET_SIZE]>,
    end_of_word: AtomicBool,
    deleted: AtomicBool,
}

impl Node {
    fn new() -> *mut Self {
        let children: Box<[AtomicPtr<Node>; ALPHABET_SIZE]> =
            Box::new(core::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())));
        Box::into_raw(Box::new(Self {
            children,
            end_of_word: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
        }))
    }

    fn is_leaf(&self) -> bool {
        self.children
            .iter()
            .all(|c| c.load(Ordering::Acquire).is_null())
    }
}

/// A concurrent prefix trie over byte strings. Empty strings are rejected
/// at every public entry point: an empty key has no meaningful prefix
/// structure to insert into or search through.
pub struct Trie {
    root: *mut Node,
    size: AtomicUsize,
}

impl Trie {
    /// Create a new empty trie.
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            size: AtomicUsize::new(0),
        }
    }

    /// Insert `word`. Rejects empty strings (`false`) and already-present
    /// live words (`false`).
    pub fn insert(&self, word: &str) -> bool {
        if word.is_empty() {
            return false;
        }
        let mut current = self.root;
        for &byte in word.as_bytes() {
            let slot = unsafe { &(*current).children[byte as usize] };
            let mut child = slot.load(Ordering::Acquire);
            if child.is_null() {
                let new_node = Node::new();
                match slot.compare_exchange(
                    ptr::null_mut(),
                    new_node,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => child = new_node,
                    Err(existing) => {
                        drop(unsafe { Box::from_raw(new_node) });
                        child = existing;
                    }
                }
            }
            current = child;
        }
        let end = unsafe { &(*current).end_of_word };
        let was_marked = end
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();
        if was_marked {
            unsafe { &(*current).deleted }.store(false, Ordering::Release);
            self.size.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            let deleted = unsafe { &(*current).deleted };
            if deleted
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.size.fetch_add(1, Ordering::Relaxed);
                true
            } else {
                false
            }
        }
    }

    fn find_node(&self, word: &str) -> *const Node {
        let mut current = self.root;
        for &byte in word.as_bytes() {
            let child = unsafe { &(*current).children[byte as usize] }.load(Ordering::Acquire);
            if child.is_null() {
                return ptr::null();
            }
            current = child;
        }
        current
    }

    /// True if `word` is present as a live, non-empty entry.
    pub fn contains(&self, word: &str) -> bool {
        if word.is_empty() {
            return false;
        }
        let node = self.find_node(word);
        !node.is_null()
            && unsafe { &*node }.end_of_word.load(Ordering::Acquire)
            && !unsafe { &*node }.deleted.load(Ordering::Acquire)
    }

    /// True if any live word in the trie has `prefix` as a prefix
    /// (including `prefix` itself, if it is a live word). Rejects the empty
    /// prefix (`false`), per this trie's empty-string convention.
    pub fn starts_with(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return false;
        }
        !self.find_node(prefix).is_null()
    }

    /// Mark `word` deleted, then opportunistically prune any node on its
    /// path left with no live purpose: no children and not itself an
    /// end-of-word marker. Pruning stops at the first node still serving a
    /// purpose (a live end-of-word, or a node with a remaining child).
    pub fn erase(&self, word: &str) -> bool {
        if word.is_empty() {
            return false;
        }
        let node = self.find_node(word);
        if node.is_null() {
            return false;
        }
        let node_ref = unsafe { &*node };
        if !node_ref.end_of_word.load(Ordering::Acquire)
            || node_ref.deleted.load(Ordering::Acquire)
        {
            return false;
        }
        if node_ref
            .deleted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        self.size.fetch_sub(1, Ordering::Relaxed);
        self.cleanup_path(word);
        true
    }

    /// Walk `word`'s path from the root, unlinking any trailing run of
    /// childless, non-end-of-word (or deleted-end-of-word) nodes.
    fn cleanup_path(&self, word: &str) {
        let bytes = word.as_bytes();
        let mut path: Vec<*mut Node> = Vec::with_capacity(bytes.len() + 1);
        path.push(self.root);
        let mut current = self.root;
        for &byte in bytes {
            let child = unsafe { &(*current).children[byte as usize] }.load(Ordering::Acquire);
            if child.is_null() {
                return;
            }
            path.push(child);
            current = child;
        }
        for i in (1..path.len()).rev() {
            let node = unsafe { &*path[i] };
            let prunable = node.is_leaf()
                && (!node.end_of_word.load(Ordering::Acquire)
                    || node.deleted.load(Ordering::Acquire));
            if !prunable {
                break;
            }
            let parent = unsafe { &*path[i - 1] };
            let byte = bytes[i - 1];
            let slot = &parent.children[byte as usize];
            if slot
                .compare_exchange(path[i], ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                drop(unsafe { Box::from_raw(path[i]) });
            } else {
                // Someone linked a new child under this node between our
                // leaf check and the CAS; leave it and stop pruning upward.
                break;
            }
        }
    }

    /// Live word count.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// True if no live word remains.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Collect every live word with the given prefix, sorted
    /// lexicographically. Rejects the empty prefix (empty result), per this
    /// trie's empty-string convention. A point-in-time snapshot, not a live
    /// view: unlike the other containers' `for_each`, this performs a full
    /// DFS and sort before returning, since autocomplete-style callers need
    /// a stable, ordered batch rather than an in-progress stream.
    pub fn collect_with_prefix(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let root = self.find_node(prefix);
        if root.is_null() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut buf = alloc::vec::Vec::from(prefix.as_bytes());
        Self::dfs_collect(root, &mut buf, &mut out);
        out.sort();
        out
    }

    fn dfs_collect(node: *const Node, buf: &mut Vec<u8>, out: &mut Vec<String>) {
        let node_ref = unsafe { &*node };
        if node_ref.end_of_word.load(Ordering::Acquire) && !node_ref.deleted.load(Ordering::Acquire)
        {
            if let Ok(word) = core::str::from_utf8(buf) {
                out.push(String::from(word));
            }
        }
        for byte in 0..ALPHABET_SIZE {
            let child = node_ref.children[byte].load(Ordering::Acquire);
            if !child.is_null() {
                buf.push(byte as u8);
                Self::dfs_collect(child, buf, out);
                buf.pop();
            }
        }
    }

    /// Count live words with the given prefix.
    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.collect_with_prefix(prefix).len()
    }

    /// The longest live word that is a prefix of `word`, if any.
    pub fn longest_prefix(&self, word: &str) -> Option<String> {
        let mut current = self.root;
        let mut best: Option<usize> = None;
        for (i, &byte) in word.as_bytes().iter().enumerate() {
            let child = unsafe { &(*current).children[byte as usize] }.load(Ordering::Acquire);
            if child.is_null() {
                break;
            }
            current = child;
            let node = unsafe { &*current };
            if node.end_of_word.load(Ordering::Acquire) && !node.deleted.load(Ordering::Acquire) {
                best = Some(i + 1);
            }
        }
        best.map(|len| String::from(&word[..len]))
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Trie {
    fn drop(&mut self) {
        fn free(node: *mut Node) {
            if node.is_null() {
                return;
            }
            let boxed = unsafe { Box::from_raw(node) };
            for child in boxed.children.iter() {
                free(child.load(Ordering::Relaxed));
            }
        }
        free(self.root);
    }
}

unsafe impl Send for Trie {}
unsafe impl Sync for Trie {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_contains_rejects_empty() {
        let t = Trie::new();
        assert!(!t.insert(""));
        assert!(t.insert("cat"));
        assert!(t.contains("cat"));
        assert!(!t.contains("ca"));
        assert!(!t.contains(""));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let t = Trie::new();
        assert!(t.insert("dog"));
        assert!(!t.insert("dog"));
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn erase_then_reinsert() {
        let t = Trie::new();
        t.insert("cat");
        assert!(t.erase("cat"));
        assert!(!t.contains("cat"));
        assert!(t.insert("cat"));
        assert!(t.contains("cat"));
    }

    #[test]
    fn prefix_queries() {
        let t = Trie::new();
        for w in ["cat", "car", "cart", "dog"] {
            t.insert(w);
        }
        assert!(t.starts_with("ca"));
        assert!(!t.starts_with("ze"));
        let mut words = t.collect_with_prefix("ca");
        words.sort();
        assert_eq!(words, alloc::vec!["car", "cart", "cat"]);
        assert_eq!(t.count_with_prefix("ca"), 3);
    }

    #[test]
    fn empty_prefix_rejected() {
        let t = Trie::new();
        t.insert("cat");
        t.insert("dog");
        assert!(!t.starts_with(""));
        assert_eq!(t.collect_with_prefix(""), Vec::<String>::new());
        assert_eq!(t.count_with_prefix(""), 0);
    }

    #[test]
    fn longest_prefix_match() {
        let t = Trie::new();
        t.insert("car");
        t.insert("cart");
        assert_eq!(t.longest_prefix("carton").as_deref(), Some("cart"));
        assert_eq!(t.longest_prefix("ca"), None);
    }

    #[test]
    fn erase_prunes_dead_branches() {
        let t = Trie::new();
        t.insert("abc");
        assert!(t.erase("abc"));
        // Re-inserting a completely unrelated word should still work, and
        // a prefix query against the pruned branch should be empty.
        assert!(t.insert("xyz"));
        assert_eq!(t.collect_with_prefix("ab"), Vec::<String>::new());
    }
}

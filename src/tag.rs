//! Tagged-pointer ABA defense.
//!
//! Where a plain pointer CAS is vulnerable to the ABA problem (a node is
//! popped, its address is reused by the application, and pushed back before
//! the original observer retries its CAS), this module packs a pointer and a
//! generation counter into a single [`AtomicU64`] so the counter closes the
//! window: a successful CAS always advances the tag, so a stale observer's
//! compare value can never match again even if the raw address recurs.
//!
//! The packed word carries a 48-bit pointer and a 16-bit tag. 48 bits covers
//! every current mainstream virtual address space (x86-64 and AArch64 both
//! expose at most 57 bits of address space, but userspace allocations sit
//! well inside the low 48 in practice). A platform with a genuinely wider
//! address space would need to narrow the tag or move to a 128-bit
//! double-word CAS instead.

use core::marker::PhantomData;
use core::sync::atomic::Ordering;

use crate::atomic::AtomicU64;

const PTR_MASK: u64 = (1u64 << 48) - 1;
const TAG_SHIFT: u32 = 48;

#[inline]
fn pack<T>(ptr: *mut T, tag: u16) -> u64 {
    ((ptr as u64) & PTR_MASK) | ((tag as u64) << TAG_SHIFT)
}

#[inline]
fn unpack_ptr<T>(word: u64) -> *mut T {
    (word & PTR_MASK) as *mut T
}

#[inline]
fn unpack_tag(word: u64) -> u16 {
    (word >> TAG_SHIFT) as u16
}

/// A pointer and generation counter packed into one 64-bit atomic word.
///
/// Every successful [`TaggedPtr::compare_exchange`] increments the tag, so a
/// thread that observed `(ptr, tag)` before a pause can never successfully
/// CAS against a later `(ptr, tag')` with `tag' != tag`, even if the
/// underlying address was reused in between.
pub struct TaggedPtr<T> {
    word: AtomicU64,
    _marker: PhantomData<*mut T>,
}

/// A snapshot of a [`TaggedPtr`]'s pointer and generation.
///
/// `Clone`/`Copy`/`PartialEq`/`Eq`/`Debug` are implemented by hand rather
/// than derived: `derive` would add a spurious `T: Trait` bound even though
/// every field (`*mut T`, `u16`) already satisfies these traits regardless
/// of `T`.
pub struct Snapshot<T> {
    ptr: *mut T,
    tag: u16,
}

impl<T> Clone for Snapshot<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Snapshot<T> {}

impl<T> PartialEq for Snapshot<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.tag == other.tag
    }
}

impl<T> Eq for Snapshot<T> {}

impl<T> core::fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Snapshot")
            .field("ptr", &self.ptr)
            .field("tag", &self.tag)
            .finish()
    }
}

impl<T> Snapshot<T> {
    /// The raw pointer component of this snapshot.
    #[inline]
    pub fn ptr(&self) -> *mut T {
        self.ptr
    }

    /// The generation tag component of this snapshot.
    #[inline]
    pub fn tag(&self) -> u16 {
        self.tag
    }

    /// True if the pointer component is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl<T> TaggedPtr<T> {
    /// Create a new tagged pointer, initially null with generation zero.
    #[cfg(not(loom))]
    #[inline]
    pub const fn null() -> Self {
        Self {
            word: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }

    /// Create a new tagged pointer, initially null with generation zero.
    ///
    /// Not `const`: loom's instrumented `AtomicU64::new` cannot be evaluated
    /// at compile time.
    #[cfg(loom)]
    #[inline]
    pub fn null() -> Self {
        Self {
            word: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }

    /// Load the current snapshot with the given ordering.
    #[inline]
    pub fn load(&self, order: Ordering) -> Snapshot<T> {
        let word = self.word.load(order);
        Snapshot {
            ptr: unpack_ptr(word),
            tag: unpack_tag(word),
        }
    }

    /// Compare-and-swap the whole (pointer, tag) word.
    ///
    /// On success, `new_tag` becomes the stored generation; callers should
    /// pass `current.tag().wrapping_add(1)` to guarantee forward progress of
    /// the counter. Returns `Ok(new_snapshot)` on success, `Err(actual)` on
    /// failure.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: Snapshot<T>,
        new_ptr: *mut T,
        new_tag: u16,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Snapshot<T>, Snapshot<T>> {
        let expected = pack(current.ptr, current.tag);
        let desired = pack(new_ptr, new_tag);
        match self
            .word
            .compare_exchange_weak(expected, desired, success, failure)
        {
            Ok(_) => Ok(Snapshot {
                ptr: new_ptr,
                tag: new_tag,
            }),
            Err(actual) => Err(Snapshot {
                ptr: unpack_ptr(actual),
                tag: unpack_tag(actual),
            }),
        }
    }
}

// SAFETY: TaggedPtr only ever moves a raw pointer between threads; the
// pointee's own Send/Sync bound governs whether sharing it is sound.
unsafe impl<T: Send> Send for TaggedPtr<T> {}
unsafe impl<T: Send> Sync for TaggedPtr<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_null() {
        let t: TaggedPtr<u32> = TaggedPtr::null();
        let snap = t.load(Ordering::Acquire);
        assert!(snap.is_null());
        assert_eq!(snap.tag(), 0);
    }

    #[test]
    fn cas_advances_tag() {
        let t: TaggedPtr<u32> = TaggedPtr::null();
        let mut x = 7u32;
        let snap = t.load(Ordering::Acquire);
        let updated = t
            .compare_exchange(
                snap,
                &mut x as *mut u32,
                snap.tag().wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .unwrap();
        assert_eq!(updated.ptr(), &mut x as *mut u32);
        assert_eq!(updated.tag(), 1);
    }

    #[test]
    fn cas_rejects_stale_tag() {
        let t: TaggedPtr<u32> = TaggedPtr::null();
        let mut x = 7u32;
        let snap0 = t.load(Ordering::Acquire);
        t.compare_exchange(snap0, &mut x, 1, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();
        // snap0 is now stale even though the pointer value being compared
        // against could coincide again after further churn.
        let result = t.compare_exchange(snap0, core::ptr::null_mut(), 2, Ordering::AcqRel, Ordering::Acquire);
        assert!(result.is_err());
    }

    #[test]
    fn aba_window_closed_by_tag() {
        let t: TaggedPtr<u32> = TaggedPtr::null();
        let mut a = 1u32;
        let snap0 = t.load(Ordering::Acquire);
        let snap1 = t
            .compare_exchange(snap0, &mut a, 1, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();
        // Pop then push the same address back (classic ABA setup).
        let snap2 = t
            .compare_exchange(snap1, core::ptr::null_mut(), 2, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();
        let snap3 = t
            .compare_exchange(snap2, &mut a, 3, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();
        assert_eq!(snap3.ptr(), &mut a as *mut u32);
        // A thread still holding the original snap1 cannot succeed even
        // though the pointer matches again, because the tag moved on.
        let stale = t.compare_exchange(snap1, core::ptr::null_mut(), 4, Ordering::AcqRel, Ordering::Acquire);
        assert!(stale.is_err());
    }
}

//! Content-addressed deduplicating pool for heap strings.
//!
//! Grounded on the `StringInternCache` pattern (content-hashed pool of raw
//! pointers, lookup hit bumps refcount, miss allocates and registers):
//! `Borrow<[u8]>` lets this pool probe by content without constructing a
//! throwaway owner, same as that cache keys on a content hash rather than
//! pointer identity. Unlike that cache's arena — sound precisely because its
//! `HeapString`s are never individually freed at all — every string here
//! *is* individually freed via `Box::from_raw` (`string.rs`'s `decrement`),
//! so the pool's own "membership" reference can't be left standing forever:
//! `KnightString::decrement` releases it itself, the moment a string's last
//! outside reference drops. See that function for the mechanics.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

use crate::literals::empty_string;
use crate::string::KnightString;

struct PoolEntry(NonNull<KnightString>);

impl PoolEntry {
    fn bytes(&self) -> &[u8] {
        unsafe { self.0.as_ref().as_bytes() }
    }
}

impl PartialEq for PoolEntry {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}
impl Eq for PoolEntry {}

impl Hash for PoolEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes().hash(state);
    }
}

impl Borrow<[u8]> for PoolEntry {
    fn borrow(&self) -> &[u8] {
        self.bytes()
    }
}

/// Owns every heap-allocated [`KnightString`] reachable from its
/// [`crate::environment::Environment`]; strings registered here are
/// deduplicated by content, but dedup is an optimization, not a correctness
/// guarantee callers may depend on.
///
/// Every entry in `pool` holds one standing reference, taken at insertion
/// time by whichever method put it there (`fetch`, `concat`, `repeat`,
/// `substring`, `register`) and recorded on the string itself via
/// [`KnightString::mark_interned`]. `KnightString::decrement` checks that
/// marker: once releasing a reference would leave only the pool's own behind,
/// it calls back into [`remove_entry`](Interner::remove_entry) and releases
/// that reference too, so a string nobody holds anymore is actually freed
/// instead of pinned alive by its own cache entry.
#[derive(Default)]
pub struct Interner {
    pool: HashSet<PoolEntry>,
}

impl Interner {
    pub fn new() -> Interner {
        Interner::default()
    }

    /// Number of distinct strings currently registered.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Drops the entry matching `bytes`, if one is registered. Called by
    /// [`KnightString::decrement`] the instant a pool-registered string's
    /// only remaining reference is the pool's own.
    pub(crate) fn remove_entry(&mut self, bytes: &[u8]) {
        self.pool.remove(bytes);
    }

    /// Returns an existing string matching `bytes`, refcount bumped, or
    /// allocates and registers a fresh one.
    pub fn fetch(&mut self, bytes: &[u8]) -> NonNull<KnightString> {
        if let Some(entry) = self.pool.get(bytes) {
            unsafe {
                entry.0.as_ref().increment();
            }
            return entry.0;
        }
        let ptr = KnightString::owned_or_embed(bytes);
        unsafe {
            ptr.as_ref().increment(); // one ref for the pool's own membership
            ptr.as_ref().mark_interned();
        }
        self.pool.insert(PoolEntry(ptr));
        ptr
    }

    /// Allocates `lhs ++ rhs` and registers it.
    pub fn concat(&mut self, lhs: &KnightString, rhs: &KnightString) -> NonNull<KnightString> {
        if lhs.is_empty() {
            return unsafe { share(rhs) };
        }
        if rhs.is_empty() {
            return unsafe { share(lhs) };
        }
        let mut buf = Vec::with_capacity(lhs.len() + rhs.len());
        buf.extend_from_slice(lhs.as_bytes());
        buf.extend_from_slice(rhs.as_bytes());
        self.register_fresh(&buf)
    }

    /// Allocates `src` repeated `n` times. `n == 0` returns the canonical
    /// empty string without touching `src`.
    pub fn repeat(&mut self, src: &KnightString, n: usize) -> NonNull<KnightString> {
        if n == 0 {
            return empty_string();
        }
        if n == 1 {
            return unsafe { share(src) };
        }
        let mut buf = Vec::with_capacity(src.len() * n);
        for _ in 0..n {
            buf.extend_from_slice(src.as_bytes());
        }
        self.register_fresh(&buf)
    }

    /// Registers a zero-copy view into `owner[start..start+len]`.
    ///
    /// # Safety
    /// `owner` must be live and `start + len <= owner.len()`.
    pub unsafe fn substring(&mut self, owner: NonNull<KnightString>, start: usize, len: usize) -> NonNull<KnightString> {
        if len == 0 {
            return empty_string();
        }
        let ptr = unsafe { KnightString::substring(owner, start, len) };
        unsafe {
            ptr.as_ref().increment(); // one ref for the pool's own membership, same as `fetch`
            ptr.as_ref().mark_interned();
        }
        self.pool.insert(PoolEntry(ptr));
        ptr
    }

    /// Inserts a pre-built string into the pool. Returns whether the
    /// insertion was new (a `false` result is non-fatal: the caller still
    /// holds a valid, unshared string that was never marked as a pool
    /// member, so it's freed by an ordinary decrement like any other string).
    pub fn register(&mut self, ptr: NonNull<KnightString>) -> bool {
        let inserted = self.pool.insert(PoolEntry(ptr));
        if inserted {
            unsafe {
                ptr.as_ref().increment();
                ptr.as_ref().mark_interned();
            }
        }
        inserted
    }

    fn register_fresh(&mut self, bytes: &[u8]) -> NonNull<KnightString> {
        let ptr = KnightString::owned_or_embed(bytes);
        unsafe {
            ptr.as_ref().increment(); // one ref for the pool's own membership, same as `fetch`
            ptr.as_ref().mark_interned();
        }
        self.pool.insert(PoolEntry(ptr));
        ptr
    }
}

/// Bumps `s`'s refcount and returns a `NonNull` to it — used when a
/// short-circuit path (empty-string concat, `repeat(_, 1)`) hands back an
/// existing string instead of allocating.
///
/// # Safety
/// `s` must be a live `KnightString` reachable through a `NonNull` elsewhere
/// (the caller is expected to have obtained `s` from such a pointer).
unsafe fn share(s: &KnightString) -> NonNull<KnightString> {
    s.increment();
    NonNull::from(s)
}

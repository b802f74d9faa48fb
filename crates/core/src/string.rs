//! Immutable, byte-oriented sequences with four storage variants.
//!
//! Every [`KnightString`] is heap-allocated (even the `Embedded` variant —
//! inlining avoids a *second* allocation for short byte runs, not the outer
//! one) so that [`crate::value::Value`] can always address it by a bare
//! pointer. Lifetime is governed by the `rc` field, bumped and dropped by
//! [`increment`](KnightString::increment) and
//! [`decrement`](KnightString::decrement) — never by Rust's `Drop`. A string
//! registered with an [`Interner`] carries one extra "pool membership"
//! reference that `decrement` itself releases once nothing else is holding
//! the string — see [`Interner`]'s module docs.

use std::cell::Cell;
use std::ptr::NonNull;

use crate::interner::Interner;

/// Chosen so `size_of::<Repr>()` matches the footprint of the pointer-bearing
/// variants: one length byte plus 15 inline bytes is 16 bytes, the same as a
/// `Box<[u8]>` fat pointer or a `Substring`'s `(NonNull, u32, u32)`.
pub const MAX_EMBED_LEN: usize = 15;

enum Repr {
    Embedded { len: u8, buf: [u8; MAX_EMBED_LEN] },
    Literal(&'static [u8]),
    Owned(Box<[u8]>),
    Substring {
        owner: NonNull<KnightString>,
        start: u32,
        len: u32,
    },
}

pub struct KnightString {
    rc: Cell<u32>,
    /// Set by [`Interner`] (via [`mark_interned`](KnightString::mark_interned))
    /// the moment this string is inserted into its pool. `decrement` checks
    /// this flag to know whether releasing the last outside reference should
    /// also release the pool's own standing reference.
    in_pool: Cell<bool>,
    repr: Repr,
}

impl KnightString {
    /// Borrows a `'static` byte range. Refcount on this variant is advisory:
    /// increments and decrements never mutate it and never free the node.
    pub fn literal(bytes: &'static [u8]) -> NonNull<KnightString> {
        Self::leak(Repr::Literal(bytes))
    }

    /// Takes ownership of an existing heap buffer.
    pub fn owned(buf: Box<[u8]>) -> NonNull<KnightString> {
        Self::leak(Repr::Owned(buf))
    }

    /// Stores `bytes` inline. Caller must ensure `bytes.len() <= MAX_EMBED_LEN`.
    pub fn embedded(bytes: &[u8]) -> NonNull<KnightString> {
        debug_assert!(bytes.len() <= MAX_EMBED_LEN);
        let mut buf = [0u8; MAX_EMBED_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self::leak(Repr::Embedded {
            len: bytes.len() as u8,
            buf,
        })
    }

    /// Picks `Embedded` or `Owned` depending on length — the copying
    /// constructor used by the interner for fresh content (concat, repeat,
    /// and any string not already sitting in a contiguous owned/'static slice).
    pub fn owned_or_embed(bytes: &[u8]) -> NonNull<KnightString> {
        if bytes.len() <= MAX_EMBED_LEN {
            Self::embedded(bytes)
        } else {
            Self::owned(bytes.to_vec().into_boxed_slice())
        }
    }

    /// Zero-copy view into `owner[start..start+len]`. Bumps `owner`'s refcount.
    ///
    /// # Safety
    /// `owner` must be live, and `start + len <= owner.len()`.
    pub unsafe fn substring(owner: NonNull<KnightString>, start: usize, len: usize) -> NonNull<KnightString> {
        unsafe {
            owner.as_ref().increment();
        }
        Self::leak(Repr::Substring {
            owner,
            start: start as u32,
            len: len as u32,
        })
    }

    fn leak(repr: Repr) -> NonNull<KnightString> {
        let boxed = Box::new(KnightString {
            rc: Cell::new(1),
            in_pool: Cell::new(false),
            repr,
        });
        NonNull::from(Box::leak(boxed))
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Embedded { len, .. } => *len as usize,
            Repr::Literal(b) => b.len(),
            Repr::Owned(b) => b.len(),
            Repr::Substring { len, .. } => *len as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Embedded { len, buf } => &buf[..*len as usize],
            Repr::Literal(b) => b,
            Repr::Owned(b) => b,
            Repr::Substring { owner, start, len } => {
                // Safe: a substring keeps its owner alive via a strong reference,
                // so the owner's backing bytes outlive this borrow.
                let owner_bytes = unsafe { owner.as_ref().as_bytes() };
                &owner_bytes[*start as usize..*start as usize + *len as usize]
            }
        }
    }

    fn is_advisory(&self) -> bool {
        matches!(self.repr, Repr::Literal(_))
    }

    /// Marks this string as registered in an [`Interner`]'s pool. Called only
    /// by `Interner` itself, immediately after it takes its own standing
    /// reference on the string.
    pub(crate) fn mark_interned(&self) {
        self.in_pool.set(true);
    }

    pub fn increment(&self) {
        if self.is_advisory() {
            return;
        }
        self.rc.set(self.rc.get().saturating_add(1));
    }

    /// Decrements the refcount. A string registered with `pool` carries one
    /// extra "pool membership" reference beyond whatever its outside holders
    /// account for; the moment a decrement would leave only that reference
    /// behind, this releases it too (removing the pool's entry) instead of
    /// leaving the string pinned alive by its own cache slot forever. Frees
    /// (and, for a `Substring`, recursively releases its owner) once the
    /// count reaches zero this way. Returns whether this call freed the node.
    ///
    /// # Safety
    /// `ptr` must be a live `KnightString` obtained from one of the
    /// constructors above, not yet freed by a prior call to `decrement`.
    pub unsafe fn decrement(ptr: NonNull<KnightString>, pool: &mut Interner) -> bool {
        let this = unsafe { ptr.as_ref() };
        if this.is_advisory() {
            return false;
        }
        let mut remaining = this.rc.get() - 1;
        this.rc.set(remaining);
        if this.in_pool.get() && remaining == 1 {
            // Only the pool's own standing reference is left: nobody else
            // can reach this string again (a future `fetch` with the same
            // bytes would just allocate afresh), so release it for real.
            pool.remove_entry(this.as_bytes());
            this.in_pool.set(false);
            remaining = 0;
            this.rc.set(0);
        }
        if remaining != 0 {
            return false;
        }
        if let Repr::Substring { owner, .. } = this.repr {
            unsafe {
                KnightString::decrement(owner, pool);
            }
        }
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        true
    }

    /// `^\s*([-+]?\d+)`, saturating to 0 on no match or overflow — Knight's
    /// string-to-integer coercion.
    pub fn parse_int(&self) -> i64 {
        let bytes = self.as_bytes();
        let mut i = 0;
        while i < bytes.len() && is_knight_space(bytes[i]) {
            i += 1;
        }
        let negative = match bytes.get(i) {
            Some(b'-') => {
                i += 1;
                true
            }
            Some(b'+') => {
                i += 1;
                false
            }
            _ => false,
        };
        let digits_start = i;
        let mut value: i64 = 0;
        let mut overflowed = false;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            let digit = (bytes[i] - b'0') as i64;
            match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(v) => value = v,
                None => {
                    overflowed = true;
                    break;
                }
            }
            i += 1;
        }
        if i == digits_start || overflowed {
            return 0;
        }
        if negative { -value } else { value }
    }
}

fn is_knight_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_round_trips_bytes() {
        let mut interner = Interner::new();
        let s = KnightString::owned_or_embed(b"hello");
        unsafe {
            assert_eq!(s.as_ref().as_bytes(), b"hello");
            assert!(KnightString::decrement(s, &mut interner));
        }
    }

    #[test]
    fn short_bytes_choose_embedded_variant() {
        let mut interner = Interner::new();
        let short = b"a".repeat(MAX_EMBED_LEN);
        let s = KnightString::owned_or_embed(&short);
        unsafe {
            assert!(matches!(s.as_ref().repr, Repr::Embedded { .. }));
            KnightString::decrement(s, &mut interner);
        }
    }

    #[test]
    fn long_bytes_choose_owned_variant() {
        let mut interner = Interner::new();
        let long = b"a".repeat(MAX_EMBED_LEN + 1);
        let s = KnightString::owned_or_embed(&long);
        unsafe {
            assert!(matches!(s.as_ref().repr, Repr::Owned(_)));
            KnightString::decrement(s, &mut interner);
        }
    }

    #[test]
    fn literal_refcount_is_advisory() {
        let mut interner = Interner::new();
        let lit = KnightString::literal(b"true");
        unsafe {
            lit.as_ref().increment();
            // A literal never reaches zero and is never freed.
            assert!(!KnightString::decrement(lit, &mut interner));
            assert!(!KnightString::decrement(lit, &mut interner));
        }
    }

    #[test]
    fn substring_keeps_owner_alive() {
        let mut interner = Interner::new();
        let owner = KnightString::owned_or_embed(b"hello world");
        let sub = unsafe { KnightString::substring(owner, 6, 5) };
        unsafe {
            assert_eq!(sub.as_ref().as_bytes(), b"world");
            // Freeing the substring must release its strong ref on owner too.
            KnightString::decrement(sub, &mut interner);
            assert!(KnightString::decrement(owner, &mut interner));
        }
    }

    #[test]
    fn parse_int_matches_knight_grammar() {
        let mut interner = Interner::new();
        let cases: &[(&[u8], i64)] = &[
            (b"123", 123),
            (b"  \t-45", -45),
            (b"+7", 7),
            (b"not a number", 0),
            (b"", 0),
            (b"   ", 0),
            (b"12abc", 12),
        ];
        for (input, expected) in cases {
            let s = KnightString::owned_or_embed(input);
            unsafe {
                assert_eq!(s.as_ref().parse_int(), *expected, "input = {input:?}");
                KnightString::decrement(s, &mut interner);
            }
        }
    }
}

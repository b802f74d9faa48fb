//! Process-wide shared literal strings.
//!
//! `"true"`, `"false"`, `"null"`, `"0"`, `"1"`, and `""` are produced
//! constantly by `to_string` coercions and by `Interner::repeat(_, 0)`.
//! Sharing one never-freed instance of each means those coercions allocate
//! nothing — the design note this module exists to satisfy.

use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::string::KnightString;

/// Knight runs single-threaded; a literal's bytes never change after
/// construction, so sharing the pointer across the (one) thread is sound.
struct SyncPtr(NonNull<KnightString>);
unsafe impl Sync for SyncPtr {}

macro_rules! literal_singleton {
    ($(#[$meta:meta])* $name:ident, $bytes:expr) => {
        $(#[$meta])*
        pub fn $name() -> NonNull<KnightString> {
            static CELL: OnceLock<SyncPtr> = OnceLock::new();
            let ptr = CELL.get_or_init(|| SyncPtr(KnightString::literal($bytes))).0;
            unsafe { ptr.as_ref().increment() };
            ptr
        }
    };
}

literal_singleton!(
    /// The canonical empty string, returned by `Interner::repeat(_, 0)` and
    /// by `* s 0`.
    empty_string,
    b""
);
literal_singleton!(true_string, b"true");
literal_singleton!(false_string, b"false");
literal_singleton!(null_string, b"null");
literal_singleton!(zero_string, b"0");
literal_singleton!(one_string, b"1");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_calls_share_one_allocation() {
        let a = empty_string();
        let b = empty_string();
        assert_eq!(a.as_ptr(), b.as_ptr());
    }
}

//! The tagged-immediate `Value` word.
//!
//! Bottom 3 bits are the tag; pointer payloads rely on the pointee's minimum
//! 8-byte alignment to keep those bits free. `constant` packs four singleton
//! payloads (`false`, `null`, `true`, the `undefined` sentinel); `integer`
//! occupies the remaining 61 bits, sign-extended on read.

use std::ptr::NonNull;

use crate::block::Block;
use crate::interner::Interner;
use crate::string::KnightString;
use crate::variable::Variable;

/// Largest representable Knight integer (61-bit signed range).
pub const MAX_INT: i64 = (1i64 << 60) - 1;
/// Smallest representable Knight integer.
pub const MIN_INT: i64 = -(1i64 << 60);

const TAG_BITS: u32 = 3;
const TAG_MASK: u64 = 0b111;

const TAG_CONSTANT: u64 = 0;
const TAG_INTEGER: u64 = 1;
const TAG_VARIABLE: u64 = 2;
const TAG_STRING: u64 = 3;
const TAG_BLOCK: u64 = 4;

const PAYLOAD_FALSE: u64 = 0 << TAG_BITS;
const PAYLOAD_NULL: u64 = 1 << TAG_BITS;
const PAYLOAD_TRUE: u64 = 2 << TAG_BITS;
const PAYLOAD_UNDEFINED: u64 = 3 << TAG_BITS;

/// A single Knight runtime datum, packed into one machine word.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Value(u64);

/// Safe, borrowed view produced by [`Value::classify`].
pub enum Classify<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    String(&'a KnightString),
    Variable(&'a Variable),
    Block(&'a Block),
}

impl Value {
    pub const NULL: Value = Value(TAG_CONSTANT | PAYLOAD_NULL);
    pub const TRUE: Value = Value(TAG_CONSTANT | PAYLOAD_TRUE);
    pub const FALSE: Value = Value(TAG_CONSTANT | PAYLOAD_FALSE);
    /// Sentinel stored in a freshly looked-up [`Variable`]; never observable
    /// except as the "not yet assigned" signal on a variable read.
    pub const UNDEFINED: Value = Value(TAG_CONSTANT | PAYLOAD_UNDEFINED);

    pub fn from_bool(b: bool) -> Value {
        if b { Value::TRUE } else { Value::FALSE }
    }

    pub fn from_int(n: i64) -> Value {
        debug_assert!(
            (MIN_INT..=MAX_INT).contains(&n),
            "integer {n} outside Knight's 61-bit range"
        );
        Value(((n << TAG_BITS) as u64) | TAG_INTEGER)
    }

    pub fn from_string(ptr: NonNull<KnightString>) -> Value {
        Self::from_ptr(ptr, TAG_STRING)
    }

    pub fn from_variable(ptr: NonNull<Variable>) -> Value {
        Self::from_ptr(ptr, TAG_VARIABLE)
    }

    pub fn from_block(ptr: NonNull<Block>) -> Value {
        Self::from_ptr(ptr, TAG_BLOCK)
    }

    fn from_ptr<T>(ptr: NonNull<T>, tag: u64) -> Value {
        let addr = ptr.as_ptr() as u64;
        debug_assert_eq!(addr & TAG_MASK, 0, "pointee must be at least 8-byte aligned");
        Value(addr | tag)
    }

    fn tag(self) -> u64 {
        self.0 & TAG_MASK
    }

    fn payload(self) -> u64 {
        self.0 & !TAG_MASK
    }

    pub fn is_null(self) -> bool {
        self.0 == Value::NULL.0
    }

    pub fn is_undefined(self) -> bool {
        self.0 == Value::UNDEFINED.0
    }

    pub fn is_string(self) -> bool {
        self.tag() == TAG_STRING
    }

    pub fn is_variable(self) -> bool {
        self.tag() == TAG_VARIABLE
    }

    pub fn is_block(self) -> bool {
        self.tag() == TAG_BLOCK
    }

    pub fn is_integer(self) -> bool {
        self.tag() == TAG_INTEGER
    }

    fn string_ptr(self) -> NonNull<KnightString> {
        debug_assert!(self.is_string());
        unsafe { NonNull::new_unchecked(self.payload() as *mut KnightString) }
    }

    fn variable_ptr(self) -> NonNull<Variable> {
        debug_assert!(self.is_variable());
        unsafe { NonNull::new_unchecked(self.payload() as *mut Variable) }
    }

    fn block_ptr(self) -> NonNull<Block> {
        debug_assert!(self.is_block());
        unsafe { NonNull::new_unchecked(self.payload() as *mut Block) }
    }

    pub fn string_ptr_checked(self) -> Option<NonNull<KnightString>> {
        self.is_string().then(|| self.string_ptr())
    }

    pub fn block_ptr_checked(self) -> Option<NonNull<Block>> {
        self.is_block().then(|| self.block_ptr())
    }

    pub fn variable_ptr_checked(self) -> Option<NonNull<Variable>> {
        self.is_variable().then(|| self.variable_ptr())
    }

    /// Safe discriminated view over the tagged word.
    ///
    /// # Safety
    /// For the `String`/`Variable`/`Block` tags, the pointee must still be
    /// live (its refcount has not reached zero).
    pub unsafe fn classify<'a>(self) -> Classify<'a> {
        match self.tag() {
            TAG_CONSTANT => match self.payload() {
                PAYLOAD_NULL => Classify::Null,
                PAYLOAD_TRUE => Classify::Boolean(true),
                PAYLOAD_FALSE => Classify::Boolean(false),
                _ => unreachable!("undefined Value observed outside a variable read"),
            },
            TAG_INTEGER => Classify::Integer((self.0 as i64) >> TAG_BITS),
            TAG_STRING => unsafe { Classify::String(self.string_ptr().as_ref()) },
            TAG_VARIABLE => unsafe { Classify::Variable(self.variable_ptr().as_ref()) },
            TAG_BLOCK => unsafe { Classify::Block(self.block_ptr().as_ref()) },
            _ => unreachable!("invalid Value tag"),
        }
    }

    /// Refcount bump. A no-op for non-pointer tags.
    pub fn increment(self) {
        match self.tag() {
            TAG_STRING => unsafe { self.string_ptr().as_ref().increment() },
            TAG_BLOCK => unsafe { Block::increment(self.block_ptr()) },
            _ => {}
        }
    }

    /// Refcount release, recursing into children once it reaches zero. A
    /// no-op for non-pointer tags.
    pub fn decrement(self, interner: &mut Interner) {
        match self.tag() {
            TAG_STRING => unsafe {
                KnightString::decrement(self.string_ptr(), interner);
            },
            TAG_BLOCK => unsafe {
                Block::decrement(self.block_ptr(), interner);
            },
            _ => {}
        }
    }

    /// Knight's integer coercion (§4.3's coercion table, `Integer` column).
    pub fn to_integer(self) -> crate::error::Result<i64> {
        match unsafe { self.classify() } {
            Classify::Null | Classify::Boolean(false) => Ok(0),
            Classify::Boolean(true) => Ok(1),
            Classify::Integer(n) => Ok(n),
            Classify::String(s) => Ok(s.parse_int()),
            Classify::Variable(_) | Classify::Block(_) => Err(crate::error::KnightError::InvalidConversion),
        }
    }

    /// Knight's boolean coercion (§4.3's coercion table, `Boolean` column).
    pub fn to_bool(self) -> crate::error::Result<bool> {
        match unsafe { self.classify() } {
            Classify::Null | Classify::Boolean(false) => Ok(false),
            Classify::Boolean(true) => Ok(true),
            Classify::Integer(n) => Ok(n != 0),
            Classify::String(s) => Ok(!s.is_empty()),
            Classify::Variable(_) | Classify::Block(_) => Err(crate::error::KnightError::InvalidConversion),
        }
    }

    /// Knight's `?` equality: immediates by bit pattern, strings by byte
    /// content, variables/blocks by pointer identity, never across tags.
    pub fn knight_eq(self, other: Value) -> bool {
        if self.tag() != other.tag() {
            return false;
        }
        if self.is_string() {
            return unsafe { self.string_ptr().as_ref().as_bytes() == other.string_ptr().as_ref().as_bytes() };
        }
        self.0 == other.0
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match unsafe { self.classify() } {
            Classify::Null => write!(f, "Null"),
            Classify::Boolean(b) => write!(f, "Boolean({b})"),
            Classify::Integer(n) => write!(f, "Integer({n})"),
            Classify::String(s) => write!(f, "String({:?})", String::from_utf8_lossy(s.as_bytes())),
            Classify::Variable(v) => write!(f, "Variable({:?})", String::from_utf8_lossy(v.name())),
            Classify::Block(b) => write!(f, "Block({})", b.function().name as char),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_round_trips_through_tagged_word() {
        for n in [0, 1, -1, MAX_INT, MIN_INT, 12345, -98765] {
            let v = Value::from_int(n);
            assert!(v.is_integer());
            match unsafe { v.classify() } {
                Classify::Integer(got) => assert_eq!(got, n),
                _ => panic!("expected Integer"),
            }
        }
    }

    #[test]
    fn constants_are_distinct_singletons() {
        assert!(Value::NULL.is_null());
        assert!(!Value::TRUE.is_null());
        assert_ne!(Value::TRUE, Value::FALSE);
        assert_ne!(Value::NULL, Value::UNDEFINED);
        assert!(Value::UNDEFINED.is_undefined());
    }

    #[test]
    fn string_value_round_trips_pointer() {
        let mut interner = Interner::new();
        let s = KnightString::owned_or_embed(b"hi");
        let v = Value::from_string(s);
        assert!(v.is_string());
        unsafe {
            match v.classify() {
                Classify::String(got) => assert_eq!(got.as_bytes(), b"hi"),
                _ => panic!("expected String"),
            }
            KnightString::decrement(s, &mut interner);
        }
    }

    #[test]
    fn knight_eq_never_crosses_tags() {
        let mut interner = Interner::new();
        let s = KnightString::owned_or_embed(b"1");
        let v = Value::from_string(s);
        assert!(!v.knight_eq(Value::from_int(1)));
        assert!(Value::from_int(1).knight_eq(Value::from_int(1)));
        unsafe {
            KnightString::decrement(s, &mut interner);
        }
    }

    #[test]
    fn knight_eq_compares_string_bytes_not_pointers() {
        let mut interner = Interner::new();
        let a = KnightString::owned_or_embed(b"same");
        let b = KnightString::owned_or_embed(b"same");
        assert!(Value::from_string(a).knight_eq(Value::from_string(b)));
        unsafe {
            KnightString::decrement(a, &mut interner);
            KnightString::decrement(b, &mut interner);
        }
    }
}

//! Error kinds for the Knight interpreter core.

use thiserror::Error;

/// Everything that can go wrong while parsing or evaluating a Knight program,
/// plus the `Exit` arm `Q` unwinds through on its way back to the driver.
#[derive(Debug, Error)]
pub enum KnightError {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("invalid conversion")]
    InvalidConversion,

    #[error("invalid type for operator '{op}': {detail}")]
    InvalidType { op: char, detail: &'static str },

    #[error("integer {0} is not a valid ASCII code point (0..=255)")]
    NotAnAsciiInteger(i64),

    #[error("expected a non-empty string")]
    EmptyString,

    #[error("domain error: {0}")]
    DomainError(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo with a negative divisor")]
    NegativeDenominator,

    #[error("integer overflow")]
    Overflow,

    #[error("index out of bounds: start {start} len {len} exceeds string of length {string_len}")]
    OutOfBounds {
        start: usize,
        len: usize,
        string_len: usize,
    },

    #[error("unexpected end of source")]
    EndOfStream,

    #[error("string literal starting at offset {0} is never closed")]
    StringDoesntEnd(usize),

    #[error("unrecognized token starting with byte {0:#04x}")]
    UnknownTokenStart(u8),

    #[error("integer literal overflows the 61-bit range")]
    IntegerLiteralOverflow,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// `Q n` (`n` in `0..=255`) unwinds the evaluator through this arm
    /// instead of calling `std::process::exit` directly — only the CLI's
    /// `main.rs` does that. Not a failure: callers special-case this variant
    /// before treating the rest of the enum as a reportable error.
    #[error("exit({0})")]
    Exit(u8),
}

pub type Result<T> = std::result::Result<T, KnightError>;

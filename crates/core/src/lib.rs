//! Core value representation for the Knight language interpreter.
//!
//! Four tightly coupled subsystems live here: the tagged-immediate [`Value`]
//! word, the refcounted [`KnightString`] with its four storage variants (and
//! the [`Interner`] that allocates them), the [`Environment`]'s name-keyed
//! [`Variable`] table, and the [`Block`]/[`Function`] call-node pair that
//! `knight-runtime`'s built-in operator table hangs off of.
//!
//! Parsing and evaluation dispatch live one layer up, in `knight-runtime`,
//! since they only need the types defined here — not the other way around.

pub mod block;
pub mod environment;
pub mod error;
pub mod interner;
pub mod literals;
pub mod string;
pub mod value;
pub mod variable;

pub use block::{Block, Function, MAX_ARITY};
pub use environment::Environment;
pub use error::{KnightError, Result};
pub use interner::Interner;
pub use string::{KnightString, MAX_EMBED_LEN};
pub use value::{Classify, MAX_INT, MIN_INT, Value};
pub use variable::Variable;

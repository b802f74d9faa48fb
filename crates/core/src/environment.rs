//! The name-keyed variable table, string interner, and RNG that a `play`
//! invocation is evaluated against.

use std::collections::HashMap;
use std::ptr::NonNull;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{KnightError, Result};
use crate::interner::Interner;
use crate::literals::{false_string, null_string, one_string, true_string, zero_string};
use crate::value::{Classify, MAX_INT, Value};
use crate::variable::Variable;

/// Owns every variable name and `Variable` cell it ever hands out, plus the
/// string interner and RNG. Every `Value` derived from a `play` invocation
/// must not outlive its `Environment`.
pub struct Environment {
    variables: HashMap<Box<[u8]>, Box<Variable>>,
    interner: Interner,
    rng: SmallRng,
}

impl Environment {
    pub fn new() -> Environment {
        tracing::debug!("seeding environment RNG from OS entropy");
        Environment {
            variables: HashMap::new(),
            interner: Interner::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Returns a stable pointer to the named variable, inserting an
    /// `undefined` cell on first lookup. Pointer-stable for the life of the
    /// environment: the `Box<Variable>` is never relocated even as the map
    /// grows, only the map's own bookkeeping moves.
    pub fn lookup(&mut self, name: &[u8]) -> NonNull<Variable> {
        if let Some(existing) = self.variables.get(name) {
            return NonNull::from(existing.as_ref());
        }
        tracing::trace!(name = %String::from_utf8_lossy(name), "binding new variable cell");
        let key: Box<[u8]> = name.into();
        let boxed = Box::new(Variable::new(key.clone()));
        let ptr = NonNull::from(boxed.as_ref());
        self.variables.insert(key, boxed);
        ptr
    }

    pub fn interner(&mut self) -> &mut Interner {
        &mut self.interner
    }

    /// Knight's `R`: a non-negative integer from a non-cryptographic,
    /// xorshift-family generator seeded once from OS entropy.
    pub fn random_int(&mut self) -> i64 {
        self.rng.gen_range(0..=MAX_INT)
    }

    /// Knight's string coercion (§4.3's coercion table, `String` column).
    /// Shares process-wide literals for the constants and for `0`/`1` so
    /// stringifying them allocates nothing.
    pub fn coerce_to_string(&mut self, value: Value) -> Result<NonNull<crate::string::KnightString>> {
        match unsafe { value.classify() } {
            Classify::Null => Ok(null_string()),
            Classify::Boolean(true) => Ok(true_string()),
            Classify::Boolean(false) => Ok(false_string()),
            Classify::Integer(0) => Ok(zero_string()),
            Classify::Integer(1) => Ok(one_string()),
            Classify::Integer(n) => Ok(self.interner.fetch(n.to_string().as_bytes())),
            Classify::String(s) => {
                s.increment();
                Ok(NonNull::from(s))
            }
            Classify::Variable(_) | Classify::Block(_) => Err(KnightError::InvalidConversion),
        }
    }
}

impl Default for Environment {
    fn default() -> Environment {
        Environment::new()
    }
}

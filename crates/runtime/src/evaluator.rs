//! `Value::run` dispatch and the top-level `play` entry point.

use knight_core::{Classify, Environment, KnightError, Result, Value};

use crate::parser;

/// Evaluates one `Value`: leaves return themselves (strings with a refcount
/// bump), variables dereference their cell, blocks invoke their function.
///
/// The caller owns exactly one net reference to the result, matching the
/// reference it already owned (or now releases) on `value`.
pub fn run(value: Value, env: &mut Environment) -> Result<Value> {
    match unsafe { value.classify() } {
        Classify::Null | Classify::Boolean(_) | Classify::Integer(_) => Ok(value),
        Classify::String(s) => {
            s.increment();
            Ok(value)
        }
        Classify::Variable(v) => {
            let current = v.get();
            if current.is_undefined() {
                return Err(KnightError::UndefinedVariable(
                    String::from_utf8_lossy(v.name()).into_owned(),
                ));
            }
            current.increment();
            Ok(current)
        }
        Classify::Block(b) => {
            tracing::trace!(op = %(b.function().name as char), "invoking block");
            b.invoke(env)
        }
    }
}

/// Parses exactly one top-level expression out of `source` and evaluates it.
/// Any bytes left over in `source` are never looked at — a driver that wants
/// more than one expression per invocation calls `play` again.
pub fn play(source: &[u8], env: &mut Environment) -> Result<Value> {
    tracing::debug!(bytes = source.len(), "parsing top-level expression");
    let value = parser::parse(source, env)?;
    let result = run(value, env);
    value.decrement(env.interner());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_are_idempotent_under_run() {
        let mut env = Environment::new();
        let v = Value::from_int(42);
        let once = run(v, &mut env).unwrap();
        let twice = run(once, &mut env).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn undefined_variable_read_is_an_error() {
        let mut env = Environment::new();
        let result = play(b"x", &mut env);
        assert!(matches!(result, Err(KnightError::UndefinedVariable(_))));
    }
}

//! The fixed table of ~29 built-in operators.
//!
//! Every operator follows the same shape: evaluate (`run`) whichever
//! arguments its semantics require, in the order the spec fixes, releasing
//! each intermediate with exactly one `decrement` once it's no longer
//! needed. The binary/ternary/quaternary operators below evaluate their
//! first argument in the public `op_*` wrapper and hand the still-owned
//! `Value` to a private `*_impl` helper that only *borrows* it (via
//! `classify`); the wrapper decrements it itself after the helper returns,
//! on every path, success or error alike.

use std::cmp::Ordering;
use std::ptr::NonNull;

use knight_core::{Classify, Environment, Function, KnightError, KnightString, MAX_INT, MIN_INT, Result, Value};

use crate::evaluator::run;

static FUNCTIONS: &[Function] = &[
    Function { name: b'P', arity: 0, func: op_prompt },
    Function { name: b'R', arity: 0, func: op_random },
    Function { name: b'E', arity: 1, func: op_eval },
    Function { name: b'B', arity: 1, func: op_block },
    Function { name: b'C', arity: 1, func: op_call },
    Function { name: b'`', arity: 1, func: op_shell },
    Function { name: b'Q', arity: 1, func: op_quit },
    Function { name: b'!', arity: 1, func: op_not },
    Function { name: b'L', arity: 1, func: op_length },
    Function { name: b'D', arity: 1, func: op_dump },
    Function { name: b'O', arity: 1, func: op_output },
    Function { name: b'A', arity: 1, func: op_ascii },
    Function { name: b'+', arity: 2, func: op_add },
    Function { name: b'-', arity: 2, func: op_sub },
    Function { name: b'*', arity: 2, func: op_mul },
    Function { name: b'/', arity: 2, func: op_div },
    Function { name: b'%', arity: 2, func: op_rem },
    Function { name: b'^', arity: 2, func: op_pow },
    Function { name: b'<', arity: 2, func: op_lt },
    Function { name: b'>', arity: 2, func: op_gt },
    Function { name: b'?', arity: 2, func: op_eq },
    Function { name: b'&', arity: 2, func: op_and },
    Function { name: b'|', arity: 2, func: op_or },
    Function { name: b';', arity: 2, func: op_seq },
    Function { name: b'W', arity: 2, func: op_while },
    Function { name: b'=', arity: 2, func: op_assign },
    Function { name: b'I', arity: 3, func: op_if },
    Function { name: b'G', arity: 3, func: op_get },
    Function { name: b'S', arity: 4, func: op_set },
];

/// Looks a built-in operator up by its one-character name.
pub fn lookup(name: u8) -> Option<&'static Function> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

fn require_integer(v: Value, op: char) -> Result<i64> {
    match unsafe { v.classify() } {
        Classify::Integer(n) => Ok(n),
        _ => Err(KnightError::InvalidType { op, detail: "expected an integer" }),
    }
}

fn checked_knight_int(n: Option<i64>) -> Result<i64> {
    match n {
        Some(v) if (MIN_INT..=MAX_INT).contains(&v) => Ok(v),
        _ => Err(KnightError::Overflow),
    }
}

// ---- arity 0 ----

fn op_prompt(_args: &[Value], env: &mut Environment) -> Result<Value> {
    use std::io::BufRead;
    let mut line = String::new();
    let n = std::io::stdin().lock().read_line(&mut line)?;
    if n == 0 {
        return Ok(Value::NULL);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    let ptr = env.interner().fetch(line.as_bytes());
    Ok(Value::from_string(ptr))
}

fn op_random(_args: &[Value], env: &mut Environment) -> Result<Value> {
    Ok(Value::from_int(env.random_int()))
}

// ---- arity 1 ----

fn op_eval(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let out = eval_impl(evaluated, env);
    evaluated.decrement(env.interner());
    out
}

fn eval_impl(evaluated: Value, env: &mut Environment) -> Result<Value> {
    let s = env.coerce_to_string(evaluated)?;
    let bytes = unsafe { s.as_ref().as_bytes() };
    let result = crate::evaluator::play(bytes, env);
    unsafe { KnightString::decrement(s, env.interner()) };
    result
}

fn op_block(args: &[Value], _env: &mut Environment) -> Result<Value> {
    args[0].increment();
    Ok(args[0])
}

fn op_call(args: &[Value], env: &mut Environment) -> Result<Value> {
    let once = run(args[0], env)?;
    let result = run(once, env);
    once.decrement(env.interner());
    result
}

fn op_shell(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let out = shell_impl(evaluated, env);
    evaluated.decrement(env.interner());
    out
}

fn shell_impl(evaluated: Value, env: &mut Environment) -> Result<Value> {
    let s = env.coerce_to_string(evaluated)?;
    let command = String::from_utf8_lossy(unsafe { s.as_ref().as_bytes() }).into_owned();
    unsafe { KnightString::decrement(s, env.interner()) };
    let output = std::process::Command::new("sh").arg("-c").arg(&command).output()?;
    let ptr = env.interner().fetch(&output.stdout);
    Ok(Value::from_string(ptr))
}

fn op_quit(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let n = evaluated.to_integer();
    evaluated.decrement(env.interner());
    let n = n?;
    match u8::try_from(n) {
        Ok(code) => {
            tracing::info!(code, "Q requested process exit");
            Err(KnightError::Exit(code))
        }
        Err(_) => Err(KnightError::DomainError("quit code must be in 0..=255")),
    }
}

fn op_not(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let b = evaluated.to_bool();
    evaluated.decrement(env.interner());
    Ok(Value::from_bool(!b?))
}

fn op_length(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let out = length_impl(evaluated, env);
    evaluated.decrement(env.interner());
    out
}

fn length_impl(evaluated: Value, env: &mut Environment) -> Result<Value> {
    let s = env.coerce_to_string(evaluated)?;
    let len = unsafe { s.as_ref().len() } as i64;
    unsafe { KnightString::decrement(s, env.interner()) };
    Ok(Value::from_int(len))
}

fn op_dump(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    print!("{}", dump_format(evaluated));
    Ok(evaluated)
}

/// Knight's `D` debug form: distinct from `Value`'s `Debug` impl (which is
/// for interpreter-development diagnostics, not the language's own output).
fn dump_format(value: Value) -> String {
    match unsafe { value.classify() } {
        Classify::Null => "Null()".to_string(),
        Classify::Boolean(b) => format!("Boolean({b})"),
        Classify::Integer(n) => format!("Integer({n})"),
        Classify::String(s) => format!("String({:?})", String::from_utf8_lossy(s.as_bytes())),
        Classify::Variable(v) => format!("Variable({})", String::from_utf8_lossy(v.name())),
        Classify::Block(b) => format!("Block({})", b.function().name as char),
    }
}

fn op_output(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let out = output_impl(evaluated, env);
    evaluated.decrement(env.interner());
    out
}

fn output_impl(evaluated: Value, env: &mut Environment) -> Result<Value> {
    use std::io::Write;
    let s = env.coerce_to_string(evaluated)?;
    let bytes = unsafe { s.as_ref().as_bytes() };
    let mut stdout = std::io::stdout();
    if bytes.last() == Some(&b'\\') {
        stdout.write_all(&bytes[..bytes.len() - 1])?;
    } else {
        stdout.write_all(bytes)?;
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    unsafe { KnightString::decrement(s, env.interner()) };
    Ok(Value::NULL)
}

fn op_ascii(args: &[Value], env: &mut Environment) -> Result<Value> {
    let evaluated = run(args[0], env)?;
    let out = ascii_impl(evaluated, env);
    evaluated.decrement(env.interner());
    out
}

fn ascii_impl(evaluated: Value, env: &mut Environment) -> Result<Value> {
    match unsafe { evaluated.classify() } {
        Classify::Integer(n) => {
            let byte = u8::try_from(n).map_err(|_| KnightError::NotAnAsciiInteger(n))?;
            let ptr = env.interner().fetch(&[byte]);
            Ok(Value::from_string(ptr))
        }
        Classify::String(s) => match s.as_bytes().first() {
            Some(&b) => Ok(Value::from_int(b as i64)),
            None => Err(KnightError::EmptyString),
        },
        _ => Err(KnightError::InvalidType { op: 'A', detail: "expected an integer or a string" }),
    }
}

// ---- arity 2 ----

fn op_add(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = add_impl(lhs, args[1], env);
    lhs.decrement(env.interner());
    out
}

fn add_impl(lhs: Value, rhs_expr: Value, env: &mut Environment) -> Result<Value> {
    match unsafe { lhs.classify() } {
        Classify::Integer(a) => {
            let rhs = run(rhs_expr, env)?;
            let b = rhs.to_integer();
            rhs.decrement(env.interner());
            Ok(Value::from_int(checked_knight_int(a.checked_add(b?))?))
        }
        Classify::String(s) => {
            if s.is_empty() {
                let rhs = run(rhs_expr, env)?;
                let out = env.coerce_to_string(rhs);
                rhs.decrement(env.interner());
                return Ok(Value::from_string(out?));
            }
            let rhs = run(rhs_expr, env)?;
            let rhs_str = env.coerce_to_string(rhs);
            rhs.decrement(env.interner());
            let rhs_str = rhs_str?;
            if unsafe { rhs_str.as_ref().is_empty() } {
                unsafe { KnightString::decrement(rhs_str, env.interner()) };
                s.increment();
                return Ok(Value::from_string(NonNull::from(s)));
            }
            let concatenated = unsafe { env.interner().concat(s, rhs_str.as_ref()) };
            unsafe { KnightString::decrement(rhs_str, env.interner()) };
            Ok(Value::from_string(concatenated))
        }
        _ => Err(KnightError::InvalidType { op: '+', detail: "expected an integer or a string" }),
    }
}

fn op_sub(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = sub_impl(lhs, args[1], env);
    lhs.decrement(env.interner());
    out
}

fn sub_impl(lhs: Value, rhs_expr: Value, env: &mut Environment) -> Result<Value> {
    let a = require_integer(lhs, '-')?;
    let rhs = run(rhs_expr, env)?;
    let b = rhs.to_integer();
    rhs.decrement(env.interner());
    Ok(Value::from_int(checked_knight_int(a.checked_sub(b?))?))
}

fn op_mul(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = mul_impl(lhs, args[1], env);
    lhs.decrement(env.interner());
    out
}

fn mul_impl(lhs: Value, rhs_expr: Value, env: &mut Environment) -> Result<Value> {
    match unsafe { lhs.classify() } {
        Classify::Integer(a) => {
            let rhs = run(rhs_expr, env)?;
            let b = rhs.to_integer();
            rhs.decrement(env.interner());
            Ok(Value::from_int(checked_knight_int(a.checked_mul(b?))?))
        }
        Classify::String(s) => {
            let rhs = run(rhs_expr, env)?;
            let n = rhs.to_integer();
            rhs.decrement(env.interner());
            let n = n?;
            if n < 0 {
                return Err(KnightError::DomainError("repeat count must be non-negative"));
            }
            let ptr = env.interner().repeat(s, n as usize);
            Ok(Value::from_string(ptr))
        }
        _ => Err(KnightError::InvalidType { op: '*', detail: "expected an integer or a string" }),
    }
}

fn op_div(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = div_impl(lhs, args[1], env);
    lhs.decrement(env.interner());
    out
}

fn div_impl(lhs: Value, rhs_expr: Value, env: &mut Environment) -> Result<Value> {
    let a = require_integer(lhs, '/')?;
    let rhs = run(rhs_expr, env)?;
    let b = rhs.to_integer();
    rhs.decrement(env.interner());
    let b = b?;
    if b == 0 {
        return Err(KnightError::DivisionByZero);
    }
    Ok(Value::from_int(checked_knight_int(a.checked_div(b))?))
}

fn op_rem(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = rem_impl(lhs, args[1], env);
    lhs.decrement(env.interner());
    out
}

fn rem_impl(lhs: Value, rhs_expr: Value, env: &mut Environment) -> Result<Value> {
    let a = require_integer(lhs, '%')?;
    let rhs = run(rhs_expr, env)?;
    let b = rhs.to_integer();
    rhs.decrement(env.interner());
    let b = b?;
    if b == 0 {
        return Err(KnightError::DivisionByZero);
    }
    if b < 0 {
        return Err(KnightError::NegativeDenominator);
    }
    Ok(Value::from_int(checked_knight_int(a.checked_rem(b))?))
}

fn op_pow(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = pow_impl(lhs, args[1], env);
    lhs.decrement(env.interner());
    out
}

fn pow_impl(lhs: Value, rhs_expr: Value, env: &mut Environment) -> Result<Value> {
    let a = require_integer(lhs, '^')?;
    let rhs = run(rhs_expr, env)?;
    let b = rhs.to_integer();
    rhs.decrement(env.interner());
    let b = b?;
    if b < 0 {
        return Err(KnightError::DomainError("exponent must be non-negative"));
    }
    Ok(Value::from_int(checked_pow(a, b as u64)?))
}

/// Exponentiation by squaring, `O(log b)` multiplications instead of `O(b)` —
/// `b` is only bounded by `MAX_INT`, so a linear loop over every exponent
/// turns a valid in-range `^` call (e.g. `^ 1 999999999999999999`) into a
/// non-terminating one well before it could ever overflow.
fn checked_pow(mut base: i64, mut exp: u64) -> Result<i64> {
    let mut result: i64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            result = checked_knight_int(result.checked_mul(base))?;
        }
        exp >>= 1;
        if exp > 0 {
            base = checked_knight_int(base.checked_mul(base))?;
        }
    }
    Ok(result)
}

fn compare(lhs: Value, rhs_expr: Value, env: &mut Environment, op: char) -> Result<Ordering> {
    match unsafe { lhs.classify() } {
        Classify::Integer(a) => {
            let rhs = run(rhs_expr, env)?;
            let b = rhs.to_integer();
            rhs.decrement(env.interner());
            Ok(a.cmp(&b?))
        }
        Classify::Boolean(a) => {
            let rhs = run(rhs_expr, env)?;
            let b = rhs.to_bool();
            rhs.decrement(env.interner());
            Ok(a.cmp(&b?))
        }
        Classify::String(s) => {
            let rhs = run(rhs_expr, env)?;
            let rhs_str = env.coerce_to_string(rhs);
            rhs.decrement(env.interner());
            let rhs_str = rhs_str?;
            let ordering = s.as_bytes().cmp(unsafe { rhs_str.as_ref().as_bytes() });
            unsafe { KnightString::decrement(rhs_str, env.interner()) };
            Ok(ordering)
        }
        _ => Err(KnightError::InvalidType { op, detail: "expected an integer, boolean, or string" }),
    }
}

fn op_lt(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = compare(lhs, args[1], env, '<').map(|o| Value::from_bool(o == Ordering::Less));
    lhs.decrement(env.interner());
    out
}

fn op_gt(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let out = compare(lhs, args[1], env, '>').map(|o| Value::from_bool(o == Ordering::Greater));
    lhs.decrement(env.interner());
    out
}

fn op_eq(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let rhs = match run(args[1], env) {
        Ok(v) => v,
        Err(e) => {
            lhs.decrement(env.interner());
            return Err(e);
        }
    };
    let eq = lhs.knight_eq(rhs);
    lhs.decrement(env.interner());
    rhs.decrement(env.interner());
    Ok(Value::from_bool(eq))
}

fn op_and(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let truthy = match lhs.to_bool() {
        Ok(b) => b,
        Err(e) => {
            lhs.decrement(env.interner());
            return Err(e);
        }
    };
    if !truthy {
        return Ok(lhs);
    }
    lhs.decrement(env.interner());
    run(args[1], env)
}

fn op_or(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    let truthy = match lhs.to_bool() {
        Ok(b) => b,
        Err(e) => {
            lhs.decrement(env.interner());
            return Err(e);
        }
    };
    if truthy {
        return Ok(lhs);
    }
    lhs.decrement(env.interner());
    run(args[1], env)
}

fn op_seq(args: &[Value], env: &mut Environment) -> Result<Value> {
    let lhs = run(args[0], env)?;
    lhs.decrement(env.interner());
    run(args[1], env)
}

fn op_while(args: &[Value], env: &mut Environment) -> Result<Value> {
    loop {
        let cond = run(args[0], env)?;
        let truthy = cond.to_bool();
        cond.decrement(env.interner());
        if !truthy? {
            break;
        }
        let body = run(args[1], env)?;
        body.decrement(env.interner());
    }
    Ok(Value::NULL)
}

fn op_assign(args: &[Value], env: &mut Environment) -> Result<Value> {
    let var_ptr = args[0]
        .variable_ptr_checked()
        .ok_or(KnightError::InvalidType { op: '=', detail: "left-hand side must be a variable" })?;
    let value = run(args[1], env)?;
    value.increment();
    unsafe { var_ptr.as_ref().set(value, env.interner()) };
    Ok(value)
}

// ---- arity 3 ----

fn op_if(args: &[Value], env: &mut Environment) -> Result<Value> {
    let cond = run(args[0], env)?;
    let truthy = cond.to_bool();
    cond.decrement(env.interner());
    if truthy? { run(args[1], env) } else { run(args[2], env) }
}

fn op_get(args: &[Value], env: &mut Environment) -> Result<Value> {
    let s = run(args[0], env)?;
    let out = get_impl(s, args[1], args[2], env);
    s.decrement(env.interner());
    out
}

fn get_impl(s: Value, start_expr: Value, len_expr: Value, env: &mut Environment) -> Result<Value> {
    let str_ptr = env.coerce_to_string(s)?;
    let bounds = read_bounds(start_expr, len_expr, env, str_ptr);
    let (start, len) = match bounds {
        Ok(v) => v,
        Err(e) => {
            unsafe { KnightString::decrement(str_ptr, env.interner()) };
            return Err(e);
        }
    };
    let result = unsafe { env.interner().substring(str_ptr, start, len) };
    unsafe { KnightString::decrement(str_ptr, env.interner()) };
    Ok(Value::from_string(result))
}

/// Evaluates `start_expr`/`len_expr`, validates them against `owner`'s
/// length, and returns `(start, len)` as `usize`s. Does not touch `owner`'s
/// refcount — callers own that release.
fn read_bounds(
    start_expr: Value,
    len_expr: Value,
    env: &mut Environment,
    owner: NonNull<KnightString>,
) -> Result<(usize, usize)> {
    let start_v = run(start_expr, env)?;
    let start = start_v.to_integer();
    start_v.decrement(env.interner());
    let start = start?;
    let len_v = run(len_expr, env)?;
    let len = len_v.to_integer();
    len_v.decrement(env.interner());
    let len = len?;
    if start < 0 || len < 0 {
        return Err(KnightError::DomainError("start and length must be non-negative"));
    }
    let (start, len) = (start as usize, len as usize);
    let owner_len = unsafe { owner.as_ref().len() };
    if start + len > owner_len {
        return Err(KnightError::OutOfBounds { start, len, string_len: owner_len });
    }
    Ok((start, len))
}

// ---- arity 4 ----

fn op_set(args: &[Value], env: &mut Environment) -> Result<Value> {
    let s = run(args[0], env)?;
    let out = set_impl(s, args[1], args[2], args[3], env);
    s.decrement(env.interner());
    out
}

fn set_impl(s: Value, start_expr: Value, len_expr: Value, repl_expr: Value, env: &mut Environment) -> Result<Value> {
    let str_ptr = env.coerce_to_string(s)?;
    let bounds = read_bounds(start_expr, len_expr, env, str_ptr);
    let (start, len) = match bounds {
        Ok(v) => v,
        Err(e) => {
            unsafe { KnightString::decrement(str_ptr, env.interner()) };
            return Err(e);
        }
    };
    let repl_v = match run(repl_expr, env) {
        Ok(v) => v,
        Err(e) => {
            unsafe { KnightString::decrement(str_ptr, env.interner()) };
            return Err(e);
        }
    };
    let repl_ptr = env.coerce_to_string(repl_v);
    repl_v.decrement(env.interner());
    let repl_ptr = match repl_ptr {
        Ok(p) => p,
        Err(e) => {
            unsafe { KnightString::decrement(str_ptr, env.interner()) };
            return Err(e);
        }
    };
    let bytes = unsafe { str_ptr.as_ref().as_bytes() };
    let repl_bytes = unsafe { repl_ptr.as_ref().as_bytes() };
    let mut buf = Vec::with_capacity(start + repl_bytes.len() + (bytes.len() - start - len));
    buf.extend_from_slice(&bytes[..start]);
    buf.extend_from_slice(repl_bytes);
    buf.extend_from_slice(&bytes[start + len..]);
    unsafe {
        KnightString::decrement(str_ptr, env.interner());
        KnightString::decrement(repl_ptr, env.interner());
    }
    Ok(Value::from_string(env.interner().fetch(&buf)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::play;

    fn eval(src: &[u8], env: &mut Environment) -> Value {
        play(src, env).unwrap_or_else(|e| panic!("unexpected error evaluating {src:?}: {e}"))
    }

    #[test]
    fn function_table_has_all_29_operators() {
        assert_eq!(FUNCTIONS.len(), 29);
    }

    #[test]
    fn while_loop_accumulates_into_final_value() {
        let mut env = Environment::new();
        let v = eval(b"; = i 0 ; W < i 5 ; = i + i 1 i", &mut env);
        assert!(matches!(unsafe { v.classify() }, Classify::Integer(5)));
        v.decrement(env.interner());
    }

    #[test]
    fn string_plus_integer_coerces_rhs() {
        let mut env = Environment::new();
        let v = eval(b"+ 'abc' 123", &mut env);
        match unsafe { v.classify() } {
            Classify::String(s) => assert_eq!(s.as_bytes(), b"abc123"),
            _ => panic!("expected String"),
        }
        v.decrement(env.interner());
    }

    #[test]
    fn string_times_integer_repeats() {
        let mut env = Environment::new();
        let v = eval(b"* '-' 5", &mut env);
        match unsafe { v.classify() } {
            Classify::String(s) => assert_eq!(s.as_bytes(), b"-----"),
            _ => panic!("expected String"),
        }
        v.decrement(env.interner());
    }

    #[test]
    fn pow_computes_small_cases() {
        let mut env = Environment::new();
        let v = eval(b"^ 2 10", &mut env);
        assert!(matches!(unsafe { v.classify() }, Classify::Integer(1024)));
        v.decrement(env.interner());

        let mut env2 = Environment::new();
        let v2 = eval(b"^ 5 0", &mut env2);
        assert!(matches!(unsafe { v2.classify() }, Classify::Integer(1)));
        v2.decrement(env2.interner());
    }

    #[test]
    fn pow_with_negative_exponent_is_a_domain_error() {
        let mut env = Environment::new();
        assert!(matches!(play(b"^ 2 -1", &mut env), Err(KnightError::DomainError(_))));
    }

    #[test]
    fn pow_rejects_overflow_instead_of_looping() {
        // 2^61 is well outside the 61-bit range; exponentiation by squaring
        // must detect this in O(log b) steps rather than looping `b` times.
        let mut env = Environment::new();
        assert!(matches!(play(b"^ 2 61", &mut env), Err(KnightError::Overflow)));
    }

    #[test]
    fn pow_with_huge_in_range_exponent_terminates_promptly() {
        // The exponent itself is a valid Knight integer nowhere near MAX_INT's
        // magnitude in iteration count terms — a naive `for _ in 0..b` loop
        // would not return in any practical amount of time. Bases whose
        // repeated squaring never leaves -1/0/1 must still come back fast.
        let mut env = Environment::new();
        let v = eval(b"^ 1 999999999999999999", &mut env);
        assert!(matches!(unsafe { v.classify() }, Classify::Integer(1)));
        v.decrement(env.interner());

        let mut env2 = Environment::new();
        let v2 = eval(b"^ -1 999999999999999999", &mut env2);
        assert!(matches!(unsafe { v2.classify() }, Classify::Integer(-1)));
        v2.decrement(env2.interner());
    }

    #[test]
    fn modulo_by_zero_is_division_by_zero() {
        let mut env = Environment::new();
        assert!(matches!(play(b"% 10 0", &mut env), Err(KnightError::DivisionByZero)));
        let mut env2 = Environment::new();
        let v = eval(b"% 10 3", &mut env2);
        assert!(matches!(unsafe { v.classify() }, Classify::Integer(1)));
        v.decrement(env2.interner());
    }

    #[test]
    fn block_and_call_round_trip_through_a_variable() {
        let mut env = Environment::new();
        let v = eval(b"; = f BLOCK + 1 2 CALL f", &mut env);
        assert!(matches!(unsafe { v.classify() }, Classify::Integer(3)));
        v.decrement(env.interner());

        let mut env2 = Environment::new();
        let v2 = eval(b"CALL + 1 2", &mut env2);
        assert!(matches!(unsafe { v2.classify() }, Classify::Integer(3)));
        v2.decrement(env2.interner());
    }

    #[test]
    fn equality_never_crosses_tags() {
        let mut env = Environment::new();
        let v = eval(b"? '1' 1", &mut env);
        assert!(matches!(unsafe { v.classify() }, Classify::Boolean(false)));
        v.decrement(env.interner());

        let mut env2 = Environment::new();
        let v2 = eval(b"? 1 1", &mut env2);
        assert!(matches!(unsafe { v2.classify() }, Classify::Boolean(true)));
        v2.decrement(env2.interner());
    }

    #[test]
    fn get_on_empty_range_returns_empty_string() {
        let mut env = Environment::new();
        let v = eval(b"G 'hello' 2 0", &mut env);
        match unsafe { v.classify() } {
            Classify::String(s) => assert!(s.is_empty()),
            _ => panic!("expected String"),
        }
        v.decrement(env.interner());
    }

    #[test]
    fn get_out_of_bounds_is_rejected() {
        let mut env = Environment::new();
        assert!(matches!(
            play(b"G 'hello' 3 3", &mut env),
            Err(KnightError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn set_replaces_a_range() {
        let mut env = Environment::new();
        let v = eval(b"S 'hello' 0 1 'j'", &mut env);
        match unsafe { v.classify() } {
            Classify::String(s) => assert_eq!(s.as_bytes(), b"jello"),
            _ => panic!("expected String"),
        }
        v.decrement(env.interner());
    }

    #[test]
    fn and_short_circuits_on_falsey_lhs() {
        let mut env = Environment::new();
        let v = eval(b"& 0 QUIT 9", &mut env);
        assert!(matches!(unsafe { v.classify() }, Classify::Integer(0)));
        v.decrement(env.interner());
    }

    #[test]
    fn quit_unwinds_as_exit_not_a_generic_error() {
        let mut env = Environment::new();
        assert!(matches!(play(b"Q 7", &mut env), Err(KnightError::Exit(7))));
        let mut env2 = Environment::new();
        assert!(matches!(
            play(b"Q 300", &mut env2),
            Err(KnightError::DomainError(_))
        ));
    }

    #[test]
    fn ascii_round_trips_between_integer_and_string() {
        let mut env = Environment::new();
        let v = eval(b"A 65", &mut env);
        match unsafe { v.classify() } {
            Classify::String(s) => assert_eq!(s.as_bytes(), b"A"),
            _ => panic!("expected String"),
        }
        v.decrement(env.interner());

        let mut env2 = Environment::new();
        let v2 = eval(b"A 'Aa'", &mut env2);
        assert!(matches!(unsafe { v2.classify() }, Classify::Integer(65)));
        v2.decrement(env2.interner());
    }
}

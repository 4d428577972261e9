//! # Arithmetic, Comparison and Logic Operators
//!
//! Implements the coercion table for `ADD SUB MUL DIV MOD NEG`, `AND OR
//! NOT`, and `EQ NEQ LT LE GT GE`. Each handler pops its operands off the
//! operand stack (right operand first, then left, matching infix `a op b`)
//! and pushes exactly one result.

use super::pop;
use crate::error::RuntimeError;
use crate::value::Value;

/// Promote two operands for a numeric binary op: stay `Int` only if both
/// sides are `Int`; otherwise coerce both to `f64`.
enum Numeric {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn promote(a: &Value, b: &Value) -> Result<Numeric, RuntimeError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Numeric::Ints(*x, *y)),
        _ => Ok(Numeric::Floats(a.as_number()?, b.as_number()?)),
    }
}

/// `+`: string concatenation when either side is a string, array merge
/// when both sides are arrays, otherwise numeric addition with `Int`
/// promoted to `Number` on any mix.
pub(super) fn handle_add(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    let result = match (&a, &b) {
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            Value::str(format!("{}{}", a.display_string(), b.display_string()))
        }
        (Value::Array(la), Value::Array(lb)) => {
            let mut merged = la.lock().clone();
            merged.extend(lb.lock().iter().cloned());
            Value::array(merged)
        }
        _ => match promote(&a, &b)? {
            Numeric::Ints(x, y) => Value::Int(x.wrapping_add(y)),
            Numeric::Floats(x, y) => Value::Number(x + y),
        },
    };
    stack.push(result);
    Ok(())
}

pub(super) fn handle_sub(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(match promote(&a, &b)? {
        Numeric::Ints(x, y) => Value::Int(x.wrapping_sub(y)),
        Numeric::Floats(x, y) => Value::Number(x - y),
    });
    Ok(())
}

/// `*`: string-repeat when one side is a string and the other numeric,
/// otherwise numeric multiplication.
pub(super) fn handle_mul(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    let result = match (&a, &b) {
        (Value::Str(s), other) | (other, Value::Str(s)) if other.as_number().is_ok() => {
            let n = other.as_number()?.max(0.0).floor() as usize;
            Value::str(s.repeat(n))
        }
        _ => match promote(&a, &b)? {
            Numeric::Ints(x, y) => Value::Int(x.wrapping_mul(y)),
            Numeric::Floats(x, y) => Value::Number(x * y),
        },
    };
    stack.push(result);
    Ok(())
}

pub(super) fn handle_div(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    match promote(&a, &b)? {
        Numeric::Ints(x, y) => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            stack.push(Value::Number(x as f64 / y as f64));
        }
        Numeric::Floats(x, y) => {
            if y == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            stack.push(Value::Number(x / y));
        }
    }
    Ok(())
}

pub(super) fn handle_mod(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    match promote(&a, &b)? {
        Numeric::Ints(x, y) => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            stack.push(Value::Int(x % y));
        }
        Numeric::Floats(x, y) => {
            if y == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            stack.push(Value::Number(x % y));
        }
    }
    Ok(())
}

pub(super) fn handle_neg(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    stack.push(match v {
        Value::Int(i) => Value::Int(-i),
        other => Value::Number(-other.as_number()?),
    });
    Ok(())
}

/// Value-retention `AND`: the result is the first falsy operand, or the
/// right operand if the left is truthy. Short-circuit evaluation (skipping
/// the right operand's side effects entirely) is the compiler's job via
/// `JUMP_IF_FALSE`; this opcode only implements the retained-value part for
/// the case where both operands already reached the stack.
pub(super) fn handle_and(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(if !a.is_truthy() { a } else { b });
    Ok(())
}

pub(super) fn handle_or(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(if a.is_truthy() { a } else { b });
    Ok(())
}

pub(super) fn handle_not(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    stack.push(Value::Bool(!v.is_truthy()));
    Ok(())
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, RuntimeError> {
    match (a, b) {
        (Value::Str(sa), Value::Str(sb)) => Ok(sa.cmp(sb)),
        _ => {
            let (x, y) = (a.as_number()?, b.as_number()?);
            x.partial_cmp(&y)
                .ok_or_else(|| RuntimeError::Type("comparison with NaN".to_string()))
        }
    }
}

/// Structural/identity equality, per [`Value::values_equal`] — never errors,
/// mismatched types simply compare unequal.
pub(super) fn handle_eq(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::Bool(Value::values_equal(&a, &b)));
    Ok(())
}

pub(super) fn handle_neq(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::Bool(!Value::values_equal(&a, &b)));
    Ok(())
}

pub(super) fn handle_lt(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::Bool(compare(&a, &b)?.is_lt()));
    Ok(())
}

pub(super) fn handle_le(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::Bool(compare(&a, &b)?.is_le()));
    Ok(())
}

pub(super) fn handle_gt(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::Bool(compare(&a, &b)?.is_gt()));
    Ok(())
}

pub(super) fn handle_ge(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::Bool(compare(&a, &b)?.is_ge()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_int_and_float_add_promotes_to_number() {
        let mut stack = vec![Value::Int(3), Value::Number(2.5)];
        handle_add(&mut stack).unwrap();
        match stack.pop().unwrap() {
            Value::Number(n) => assert_eq!(n, 5.5),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn string_concatenation_via_add() {
        let mut stack = vec![Value::str("count: "), Value::Int(5)];
        handle_add(&mut stack).unwrap();
        assert_eq!(stack.pop().unwrap().display_string(), "count: 5");
    }

    #[test]
    fn division_by_zero_is_recoverable_error() {
        let mut stack = vec![Value::Int(10), Value::Int(0)];
        let err = handle_div(&mut stack).unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn and_retains_first_falsy_operand() {
        let mut stack = vec![Value::Int(0), Value::Bool(false)];
        handle_and(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Int(0)));
    }

    #[test]
    fn string_repeat_via_mul() {
        let mut stack = vec![Value::str("ab"), Value::Int(3)];
        handle_mul(&mut stack).unwrap();
        assert_eq!(stack.pop().unwrap().display_string(), "ababab");
    }

    #[test]
    fn int_only_subtraction_stays_int() {
        let mut stack = vec![Value::Int(10), Value::Int(3)];
        handle_sub(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Int(7)));
    }
}

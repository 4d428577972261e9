//! # Iteration Protocol
//!
//! `ITER_START`/`ITER_NEXT`/`ITER_END` drive `for` loops over arrays, map
//! key sets, and string characters. Iterator state lives on a dedicated
//! iteration stack (owned by [`super::Vm`]), never on the operand stack, so
//! a loop body mutating the operand stack cannot corrupt in-flight
//! iteration bookkeeping. Map iteration snapshots the key set at
//! `ITER_START`: keys added or removed mid-loop do not affect the
//! in-progress traversal.

use super::pop;
use crate::error::RuntimeError;
use crate::value::{IteratorKind, IteratorState, Value};

/// `ITER_START`: pop the iterable, push an `IteratorState` onto the
/// iteration stack (not the operand stack).
pub(super) fn handle_iter_start(
    stack: &mut Vec<Value>,
    iter_stack: &mut Vec<IteratorState>,
) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    let kind = match v {
        Value::Array(items) => IteratorKind::Array(items),
        Value::Map(map) => {
            let mut keys: Vec<String> = map.read().keys().cloned().collect();
            keys.sort();
            IteratorKind::MapKeys(keys)
        }
        Value::Str(s) => IteratorKind::Chars(s.chars().collect()),
        other => {
            return Err(RuntimeError::Type(format!("{} is not iterable", other.type_of())))
        }
    };
    iter_stack.push(IteratorState { index: 0, kind });
    Ok(())
}

/// `ITER_NEXT`: push the next element plus `true` if the top iterator has
/// one, advancing its cursor; otherwise push `(null, false)`. Always two
/// values, so a compiler-emitted epilogue can rely on a fixed stack effect
/// whether or not the loop actually ran another iteration.
pub(super) fn handle_iter_next(
    stack: &mut Vec<Value>,
    iter_stack: &mut [IteratorState],
) -> Result<(), RuntimeError> {
    let state = iter_stack
        .last_mut()
        .ok_or_else(|| RuntimeError::Bounds("ITER_NEXT with no active iterator".to_string()))?;
    let next = match &state.kind {
        IteratorKind::Array(items) => items.lock().get(state.index).cloned(),
        IteratorKind::MapKeys(keys) => keys.get(state.index).cloned().map(Value::str),
        IteratorKind::Chars(chars) => chars.get(state.index).map(|c| Value::str(c.to_string())),
    };
    match next {
        Some(v) => {
            state.index += 1;
            stack.push(v);
            stack.push(Value::Bool(true));
        }
        None => {
            stack.push(Value::Null);
            stack.push(Value::Bool(false));
        }
    }
    Ok(())
}

/// `ITER_END`: pop the top iterator off the iteration stack.
pub(super) fn handle_iter_end(iter_stack: &mut Vec<IteratorState>) -> Result<(), RuntimeError> {
    iter_stack
        .pop()
        .ok_or_else(|| RuntimeError::Bounds("ITER_END with no active iterator".to_string()))?;
    Ok(())
}

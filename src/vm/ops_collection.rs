//! # Array, Map and String Operations
//!
//! `ARRAY`/`MAP` construction, `INDEX`/`SET_INDEX`, the length and map
//! accessor opcodes, and `CONCAT`. Arrays are `Mutex`-guarded only for
//! `Send`/`Sync` soundness across `SPAWN`-ed tasks; no handler here holds a
//! lock across more than one collection access.

use std::collections::HashMap;

use super::pop;
use crate::error::RuntimeError;
use crate::value::Value;

/// `ARRAY n`: pop `n` values (in reverse push order) and build an array.
pub(super) fn handle_array(n: usize, stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        items.push(pop(stack)?);
    }
    items.reverse();
    stack.push(Value::array(items));
    Ok(())
}

/// `MAP n`: pop `n` (key, value) pairs — value first, then key, per push
/// order `key value key value ...` — and build a map.
pub(super) fn handle_map(n: usize, stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let mut entries = HashMap::with_capacity(n);
    for _ in 0..n {
        let value = pop(stack)?;
        let key = pop(stack)?;
        let key = key
            .as_string()
            .ok_or_else(|| RuntimeError::Type("map keys must be strings".to_string()))?
            .to_string();
        entries.insert(key, value);
    }
    stack.push(Value::map(entries));
    Ok(())
}

/// `INDEX`: `array[i]`, `map[k]`, or `string[i]` (single-character result).
/// Reads never raise on a bad key — out-of-range array/string access and
/// indexing a `null` or primitive both yield `Value::Null` (a deliberate
/// JavaScript-like forgiveness; only `SET_INDEX` raises on out-of-range).
/// A string key on an array exposes `length` and, for anything else, a
/// bound method resolved through the native registry at `CALL` time.
pub(super) fn handle_index(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let key = pop(stack)?;
    let base = pop(stack)?;
    let result = match (&base, &key) {
        (Value::Array(items), Value::Int(i)) => array_get(&items.lock(), *i),
        (Value::Array(items), Value::Str(s)) => {
            if s.as_ref() == "length" {
                Value::Int(items.lock().len() as i64)
            } else {
                Value::Bound(Box::new(base.clone()), s.clone())
            }
        }
        (Value::Map(map), Value::Str(k)) => map
            .read()
            .get(k.as_ref())
            .cloned()
            .ok_or_else(|| RuntimeError::Bounds(format!("no such key '{k}'")))?,
        (Value::Str(s), Value::Int(i)) => string_char_at(s, *i),
        (Value::Module(m), Value::Str(k)) => {
            m.exports.read().get(k.as_ref()).cloned().unwrap_or(Value::Null)
        }
        (Value::Null, _) | (Value::Bool(_), _) | (Value::Int(_), _) | (Value::Number(_), _) => {
            Value::Null
        }
        (other, _) => {
            return Err(RuntimeError::Type(format!("{} is not indexable", other.type_of())))
        }
    };
    stack.push(result);
    Ok(())
}

/// `SET_INDEX`: `array[i] = v` or `map[k] = v`. Arrays auto-grow on an
/// in-bounds-after-growth index; out-of-range negative indices still error.
pub(super) fn handle_set_index(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let value = pop(stack)?;
    let key = pop(stack)?;
    let base = pop(stack)?;
    match (&base, &key) {
        (Value::Array(items), Value::Int(i)) => {
            if *i < 0 {
                return Err(RuntimeError::Bounds(format!("negative array index {i}")));
            }
            let mut items = items.lock();
            let idx = *i as usize;
            if idx >= items.len() {
                items.resize(idx + 1, Value::Null);
            }
            items[idx] = value;
        }
        (Value::Map(map), Value::Str(k)) => {
            map.write().insert(k.to_string(), value);
        }
        (other, _) => {
            return Err(RuntimeError::Type(format!("{} is not assignable by index", other.type_of())))
        }
    }
    Ok(())
}

pub(super) fn handle_array_len(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    match v {
        Value::Array(items) => {
            stack.push(Value::Int(items.lock().len() as i64));
            Ok(())
        }
        other => Err(RuntimeError::Type(format!("{} has no array length", other.type_of()))),
    }
}

pub(super) fn handle_string_len(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    match v {
        Value::Str(s) => {
            stack.push(Value::Int(s.chars().count() as i64));
            Ok(())
        }
        other => Err(RuntimeError::Type(format!("{} has no string length", other.type_of()))),
    }
}

pub(super) fn handle_map_keys(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    match v {
        Value::Map(map) => {
            let mut keys: Vec<Value> = map.read().keys().cloned().map(Value::str).collect();
            keys.sort_by(|a, b| a.display_string().cmp(&b.display_string()));
            stack.push(Value::array(keys));
            Ok(())
        }
        other => Err(RuntimeError::Type(format!("{} is not a map", other.type_of()))),
    }
}

pub(super) fn handle_map_values(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    match v {
        Value::Map(map) => {
            stack.push(Value::array(map.read().values().cloned().collect()));
            Ok(())
        }
        other => Err(RuntimeError::Type(format!("{} is not a map", other.type_of()))),
    }
}

pub(super) fn handle_map_delete(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let key = pop(stack)?;
    let base = pop(stack)?;
    match (base, key) {
        (Value::Map(map), Value::Str(k)) => {
            let removed = map.write().remove(k.as_ref()).is_some();
            stack.push(Value::Bool(removed));
            Ok(())
        }
        (other, _) => Err(RuntimeError::Type(format!("{} is not a map", other.type_of()))),
    }
}

pub(super) fn handle_map_get(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let default = pop(stack)?;
    let key = pop(stack)?;
    let base = pop(stack)?;
    match (base, key) {
        (Value::Map(map), Value::Str(k)) => {
            let found = map.read().get(k.as_ref()).cloned();
            stack.push(found.unwrap_or(default));
            Ok(())
        }
        (other, _) => Err(RuntimeError::Type(format!("{} is not a map", other.type_of()))),
    }
}

pub(super) fn handle_map_set(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let value = pop(stack)?;
    let key = pop(stack)?;
    let base = pop(stack)?;
    match (base, key) {
        (Value::Map(map), Value::Str(k)) => {
            map.write().insert(k.to_string(), value);
            Ok(())
        }
        (other, _) => Err(RuntimeError::Type(format!("{} is not a map", other.type_of()))),
    }
}

/// `CONCAT`: always stringifies both sides, unlike `ADD`'s narrower
/// string-if-either-side rule — the explicit "make this a string" opcode.
pub(super) fn handle_concat(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(Value::str(format!("{}{}", a.display_string(), b.display_string())));
    Ok(())
}

/// Out-of-range or negative reads are `Value::Null`, never an error.
fn array_get(items: &[Value], i: i64) -> Value {
    if i < 0 {
        return Value::Null;
    }
    items.get(i as usize).cloned().unwrap_or(Value::Null)
}

/// Out-of-range or negative reads are `Value::Null`, never an error.
fn string_char_at(s: &str, i: i64) -> Value {
    if i < 0 {
        return Value::Null;
    }
    s.chars()
        .nth(i as usize)
        .map(|c| Value::str(c.to_string()))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_index_out_of_bounds_reads_null() {
        let mut stack = vec![Value::array(vec![Value::Int(1)]), Value::Int(5)];
        handle_index(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Null));
    }

    #[test]
    fn string_index_out_of_bounds_reads_null() {
        let mut stack = vec![Value::str("hi"), Value::Int(9)];
        handle_index(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Null));
    }

    #[test]
    fn indexing_a_primitive_reads_null_rather_than_erroring() {
        let mut stack = vec![Value::Int(7), Value::Int(0)];
        handle_index(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Null));
    }

    #[test]
    fn array_length_property_access() {
        let mut stack = vec![Value::array(vec![Value::Int(1), Value::Int(2)]), Value::str("length")];
        handle_index(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Int(2)));
    }

    #[test]
    fn array_string_key_other_than_length_yields_a_bound_method() {
        let mut stack = vec![Value::array(vec![]), Value::str("push")];
        handle_index(&mut stack).unwrap();
        match stack.pop().unwrap() {
            Value::Bound(receiver, name) => {
                assert_eq!(name.as_ref(), "push");
                assert!(matches!(*receiver, Value::Array(_)));
            }
            other => panic!("expected a bound method, got {other:?}"),
        }
    }

    #[test]
    fn set_index_grows_array() {
        let array = Value::array(vec![]);
        let mut stack = vec![array.clone(), Value::Int(2), Value::Int(9)];
        handle_set_index(&mut stack).unwrap();
        match array {
            Value::Array(items) => {
                let items = items.lock();
                assert_eq!(items.len(), 3);
                assert!(matches!(items[2], Value::Int(9)));
                assert!(matches!(items[0], Value::Null));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn map_get_falls_back_to_default() {
        let mut stack = vec![Value::map(HashMap::new()), Value::str("missing"), Value::Int(42)];
        handle_map_get(&mut stack).unwrap();
        assert!(matches!(stack.pop().unwrap(), Value::Int(42)));
    }

    #[test]
    fn map_keys_are_sorted_and_snapshotted() {
        let mut entries = HashMap::new();
        entries.insert("z".to_string(), Value::Int(1));
        entries.insert("a".to_string(), Value::Int(2));
        let mut stack = vec![Value::map(entries)];
        handle_map_keys(&mut stack).unwrap();
        assert_eq!(stack.pop().unwrap().display_string(), "[a, z]");
    }
}

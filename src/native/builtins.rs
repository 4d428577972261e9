//! # Default Native Catalogue
//!
//! The breadth of built-in functions a host typically pre-registers before
//! running a script — `spec.md` fixes only the calling convention that
//! exposes these to bytecode, not their concrete semantics, but a VM with
//! an empty registry can't run much, so a reasonable default catalogue is
//! supplied here, modeled on the builtin-dispatch conventions the teacher
//! engine uses (arity/type mismatches surface as `RuntimeError::Type`,
//! value problems as a message-carrying error, IO failures wrapped the
//! same way).

use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::NativeRegistry;
use crate::error::RuntimeError;
use crate::value::Value;

fn want_number(args: &[Value], i: usize, who: &str) -> Result<f64, RuntimeError> {
    args.get(i)
        .ok_or_else(|| RuntimeError::Arity(format!("{who}: missing argument {i}")))?
        .as_number()
}

fn want_string<'a>(args: &'a [Value], i: usize, who: &str) -> Result<&'a str, RuntimeError> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(RuntimeError::Type(format!(
            "{who}: expected string at argument {i}, got {}",
            other.type_of()
        ))),
        None => Err(RuntimeError::Arity(format!("{who}: missing argument {i}"))),
    }
}

pub fn register_all(reg: &mut NativeRegistry) {
    register_math(reg);
    register_string(reg);
    register_collection(reg);
    register_array(reg);
    register_io(reg);
    register_time(reg);
    register_error_helpers(reg);
}

/// Array mutator methods reached through a `Value::Bound` receiver — the
/// `INDEX` handler hands back `array["push"]` etc. as a bound method rather
/// than a plain value, and `CALL` resolves it here with the array prepended.
fn register_array(reg: &mut NativeRegistry) {
    reg.register("array.push", 2, |a| match &a[0] {
        Value::Array(items) => {
            items.lock().push(a[1].clone());
            Ok(Value::Int(items.lock().len() as i64))
        }
        other => Err(RuntimeError::Type(format!("array.push expects an array receiver, got {}", other.type_of()))),
    });
    reg.register("array.pop", 1, |a| match &a[0] {
        Value::Array(items) => Ok(items.lock().pop().unwrap_or(Value::Null)),
        other => Err(RuntimeError::Type(format!("array.pop expects an array receiver, got {}", other.type_of()))),
    });
}

fn register_math(reg: &mut NativeRegistry) {
    reg.register("math.abs", 1, |a| Ok(Value::Number(want_number(a, 0, "math.abs")?.abs())));
    reg.register("math.min", 2, |a| {
        Ok(Value::Number(want_number(a, 0, "math.min")?.min(want_number(a, 1, "math.min")?)))
    });
    reg.register("math.max", 2, |a| {
        Ok(Value::Number(want_number(a, 0, "math.max")?.max(want_number(a, 1, "math.max")?)))
    });
    reg.register("math.pow", 2, |a| {
        Ok(Value::Number(want_number(a, 0, "math.pow")?.powf(want_number(a, 1, "math.pow")?)))
    });
    reg.register("math.sqrt", 1, |a| {
        let v = want_number(a, 0, "math.sqrt")?;
        if v < 0.0 {
            return Err(RuntimeError::Native("math.sqrt: negative argument".to_string()));
        }
        Ok(Value::Number(v.sqrt()))
    });
    reg.register("math.floor", 1, |a| Ok(Value::Number(want_number(a, 0, "math.floor")?.floor())));
    reg.register("math.ceil", 1, |a| Ok(Value::Number(want_number(a, 0, "math.ceil")?.ceil())));
    reg.register("math.round", 1, |a| Ok(Value::Number(want_number(a, 0, "math.round")?.round())));
}

fn register_string(reg: &mut NativeRegistry) {
    reg.register("string.length", 1, |a| match a.first() {
        Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
        _ => Err(RuntimeError::Type("string.length expects a string".to_string())),
    });
    reg.register("string.upper", 1, |a| Ok(Value::str(want_string(a, 0, "string.upper")?.to_uppercase())));
    reg.register("string.lower", 1, |a| Ok(Value::str(want_string(a, 0, "string.lower")?.to_lowercase())));
    reg.register("string.trim", 1, |a| Ok(Value::str(want_string(a, 0, "string.trim")?.trim())));
    reg.register("string.contains", 2, |a| {
        let haystack = want_string(a, 0, "string.contains")?;
        let needle = want_string(a, 1, "string.contains")?;
        Ok(Value::Bool(haystack.contains(needle)))
    });
    reg.register("string.split", 2, |a| {
        let s = want_string(a, 0, "string.split")?;
        let sep = want_string(a, 1, "string.split")?;
        let parts: Vec<Value> = if sep.is_empty() {
            s.chars().map(|c| Value::str(c.to_string())).collect()
        } else {
            s.split(sep).map(Value::str).collect()
        };
        Ok(Value::array(parts))
    });
    reg.register("string.join", 2, |a| {
        let sep = want_string(a, 1, "string.join")?;
        match a.first() {
            Some(Value::Array(items)) => {
                let parts: Vec<String> =
                    items.lock().iter().map(Value::display_string).collect();
                Ok(Value::str(parts.join(sep)))
            }
            _ => Err(RuntimeError::Type("string.join expects an array".to_string())),
        }
    });
    reg.register("string.chr", 1, |a| {
        let code = want_number(a, 0, "string.chr")? as u32;
        char::from_u32(code)
            .map(|c| Value::str(c.to_string()))
            .ok_or_else(|| RuntimeError::Native(format!("string.chr: invalid code point {code}")))
    });
    reg.register("string.ascii", 1, |a| {
        let s = want_string(a, 0, "string.ascii")?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Int(c as i64)),
            _ => Err(RuntimeError::Native("string.ascii expects a single character".to_string())),
        }
    });
    reg.register("string.hex", 1, |a| Ok(Value::str(format!("{:x}", want_number(a, 0, "string.hex")? as i64))));
}

fn register_collection(reg: &mut NativeRegistry) {
    reg.register("collection.keys", 1, |a| match a.first() {
        Some(Value::Map(m)) => {
            let mut ks: Vec<Value> = m.read().keys().cloned().map(Value::str).collect();
            ks.sort_by(|x, y| x.display_string().cmp(&y.display_string()));
            Ok(Value::array(ks))
        }
        _ => Err(RuntimeError::Type("collection.keys expects a map".to_string())),
    });
    reg.register("collection.values", 1, |a| match a.first() {
        Some(Value::Map(m)) => Ok(Value::array(m.read().values().cloned().collect())),
        _ => Err(RuntimeError::Type("collection.values expects a map".to_string())),
    });
    reg.register("collection.freeze", 1, |a| match a.first() {
        Some(Value::Map(m)) => Ok(Value::map(m.read().clone())),
        _ => Err(RuntimeError::Type("collection.freeze expects a map".to_string())),
    });
}

fn register_io(reg: &mut NativeRegistry) {
    reg.register("io.print", -1, |a| {
        bump_call_count();
        let line = a.iter().map(Value::display_string).collect::<Vec<_>>().join(" ");
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{line}");
        Ok(Value::Null)
    });
    reg.register("io.read_file", 1, |a| {
        let path = want_string(a, 0, "io.read_file")?;
        fs::read_to_string(path)
            .map(Value::str)
            .map_err(|e| RuntimeError::Native(format!("read_file '{path}': {e}")))
    });
    reg.register("io.file_exists", 1, |a| {
        let path = want_string(a, 0, "io.file_exists")?;
        Ok(Value::Bool(std::path::Path::new(path).exists()))
    });
}

fn register_time(reg: &mut NativeRegistry) {
    reg.register("time.now_millis", 0, |_| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Ok(Value::Int(now.as_millis() as i64))
    });
    reg.register("time.sleep_ms", 1, |a| {
        let ms = want_number(a, 0, "time.sleep_ms")? as u64;
        std::thread::sleep(std::time::Duration::from_millis(ms));
        Ok(Value::Null)
    });
}

fn register_error_helpers(reg: &mut NativeRegistry) {
    reg.register("error.panic", 1, |a| {
        Err(RuntimeError::Native(want_string(a, 0, "error.panic")?.to_string()))
    });
    reg.register("error.raise", 1, |a| {
        Err(RuntimeError::Native(want_string(a, 0, "error.raise")?.to_string()))
    });
}

/// Process-global call counter, in the spirit of the teacher's
/// `once_cell`-backed file-descriptor table: state a native function needs
/// that the VM itself has no business tracking.
static CALL_COUNT: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));

pub fn bump_call_count() -> u64 {
    CALL_COUNT.fetch_add(1, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::call_native;

    #[test]
    fn math_sqrt_rejects_negative() {
        let mut reg = NativeRegistry::new();
        register_math(&mut reg);
        let sqrt = reg.lookup("math.sqrt").unwrap();
        let err = call_native(&sqrt, &[Value::Int(-4)]).unwrap_err();
        assert!(matches!(err, RuntimeError::Native(_)));
    }

    #[test]
    fn string_split_and_join_round_trip() {
        let mut reg = NativeRegistry::new();
        register_string(&mut reg);
        let split = reg.lookup("string.split").unwrap();
        let joined = reg.lookup("string.join").unwrap();
        let parts = call_native(&split, &[Value::str("a,b,c"), Value::str(",")]).unwrap();
        let back = call_native(&joined, &[parts, Value::str("-")]).unwrap();
        assert_eq!(back.display_string(), "a-b-c");
    }

    #[test]
    fn collection_keys_are_sorted() {
        let mut reg = NativeRegistry::new();
        register_collection(&mut reg);
        let mut map = std::collections::HashMap::new();
        map.insert("b".to_string(), Value::Int(2));
        map.insert("a".to_string(), Value::Int(1));
        let keys = reg.lookup("collection.keys").unwrap();
        let result = call_native(&keys, &[Value::map(map)]).unwrap();
        assert_eq!(result.display_string(), "[a, b]");
    }
}

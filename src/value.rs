//! # Value Representation for the Ember VM
//!
//! [`Value`] is the universal runtime type that flows through the operand
//! stack, local slots, globals, map entries and native-call argument lists.
//!
//! ## Supported variants
//! - `Null` — the single "no value" sentinel; also the default for
//!   auto-grown local slots.
//! - `Bool(bool)`
//! - `Int(i64)` / `Number(f64)` — kept distinct; mixed arithmetic promotes
//!   the `Int` side to `Number` (see `SPEC_FULL.md` §3, Open Question
//!   resolution).
//! - `Str(Arc<str>)` — immutable, cheaply cloned.
//! - `Array(Arc<Mutex<Vec<Value>>>)` — mutable, shareable across `SPAWN`-ed
//!   tasks. The mutex exists for `Send`/`Sync` soundness only; the engine
//!   never holds it across an opcode boundary and makes no multi-operation
//!   atomicity guarantee (scripts sharing arrays across tasks are on their
//!   own, per `spec.md` §5).
//! - `Map(Arc<RwLock<HashMap<String, Value>>>)` — mutable, internally
//!   locked; genuinely safe to share.
//! - `Function(Arc<UserFunction>)` / `Native(Arc<NativeFunction>)` /
//!   `Bound(Box<Value>, Arc<str>)`.
//! - `Module(Arc<ModuleInstance>)`, `Channel(Arc<Channel>)`,
//!   `Error(Arc<ErrorObject>)`, `Iterator(Arc<Mutex<IteratorState>>)`.
//!
//! ## Coercion rules
//! Truthiness, numeric coercion and stringification live here; the
//! operator semantics that combine them (`+`, `==`, ...) live in
//! `vm::ops_arith` and `vm::ops_collection`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::chunk::Chunk;
use crate::error::RuntimeError;
use crate::module::ModuleInstance;

/// A compiled user function: name, declared arity, owning chunk, and the
/// module it was defined in (if any).
pub struct UserFunction {
    pub name: String,
    pub arity: usize,
    pub is_variadic: bool,
    pub chunk: Arc<Chunk>,
    pub owning_module: Option<Arc<ModuleInstance>>,
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("is_variadic", &self.is_variadic)
            .finish()
    }
}

/// The host-side implementation of a native function: opaque to the VM.
pub type NativeImpl = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// A registered native (host-implemented) callable.
pub struct NativeFunction {
    pub name: String,
    /// `-1` marks a variadic native; otherwise the exact declared arity.
    pub declared_arity: i32,
    pub imp: Box<NativeImpl>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("declared_arity", &self.declared_arity)
            .finish()
    }
}

/// An error value surfaced to a catch handler; carries at least a message.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub kind: String,
    pub message: String,
}

/// A bounded, mutex-and-condvar FIFO used by `CHANNEL_*` opcodes.
pub struct Channel {
    pub(crate) state: Mutex<ChannelState>,
    pub(crate) not_empty: parking_lot::Condvar,
    pub(crate) not_full: parking_lot::Condvar,
    pub(crate) capacity: usize,
}

pub(crate) struct ChannelState {
    pub(crate) queue: std::collections::VecDeque<Value>,
    pub(crate) closed: bool,
}

impl Channel {
    pub fn new(capacity: usize) -> Self {
        Channel {
            state: Mutex::new(ChannelState {
                queue: std::collections::VecDeque::new(),
                closed: false,
            }),
            not_empty: parking_lot::Condvar::new(),
            not_full: parking_lot::Condvar::new(),
            capacity,
        }
    }
}

/// Bookkeeping that drives a `for` loop; lives on the VM's iteration stack,
/// never on the operand stack, so loop bodies cannot corrupt it.
#[derive(Debug, Clone)]
pub struct IteratorState {
    pub index: usize,
    pub kind: IteratorKind,
}

#[derive(Debug, Clone)]
pub enum IteratorKind {
    Array(Arc<Mutex<Vec<Value>>>),
    /// Snapshot of the key set taken at `ITER_START`, so mid-loop mutation
    /// of the map cannot affect iteration order or membership.
    MapKeys(Vec<String>),
    Chars(Vec<char>),
}

/// The universal runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(Arc<str>),
    Array(Arc<Mutex<Vec<Value>>>),
    Map(Arc<RwLock<HashMap<String, Value>>>),
    Function(Arc<UserFunction>),
    Native(Arc<NativeFunction>),
    Bound(Box<Value>, Arc<str>),
    Module(Arc<ModuleInstance>),
    Channel(Arc<Channel>),
    Error(Arc<ErrorObject>),
    Iterator(Arc<Mutex<IteratorState>>),
}

impl Value {
    pub fn str(s: impl Into<Arc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Arc::new(Mutex::new(items)))
    }

    pub fn map(entries: HashMap<String, Value>) -> Value {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Value {
        Value::Error(Arc::new(ErrorObject {
            kind: kind.into(),
            message: message.into(),
        }))
    }

    pub fn from_runtime_error(e: &RuntimeError) -> Value {
        Value::error(e.kind_name(), e.message())
    }

    /// Stable short type tag, as returned by the `TYPEOF` opcode.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Function(_) | Value::Native(_) | Value::Bound(_, _) => "function",
            Value::Module(_) => "module",
            Value::Channel(_) => "channel",
            Value::Error(_) => "error",
            Value::Iterator(_) => "iterator",
        }
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.type_of() == name
    }

    /// Truthiness per `spec.md` §4.1: only `null` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Coerce to `f64` for arithmetic. Strings are never implicitly
    /// numeric; only `Int`/`Number`/`Bool` coerce cleanly.
    pub fn as_number(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Ok(0.0),
            other => Err(RuntimeError::Type(format!(
                "cannot coerce {} to number",
                other.type_of()
            ))),
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable stringification, used by `CONCAT`, string `+`, and
    /// diagnostics.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(arr) => {
                let items: Vec<String> = arr.lock().iter().map(Value::display_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(map) => {
                let guard = map.read();
                let items: Vec<String> = guard
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.display_string()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Function(f) => format!("<function {}>", f.name),
            Value::Native(f) => format!("<native {}>", f.name),
            Value::Bound(_, name) => format!("<bound method {}>", name),
            Value::Module(m) => format!("<module {}>", m.name),
            Value::Channel(_) => "<channel>".to_string(),
            Value::Error(e) => format!("{}: {}", e.kind, e.message),
            Value::Iterator(_) => "<iterator>".to_string(),
        }
    }

    /// Structural/identity equality per `spec.md` §4.1.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Int(x), Value::Number(y)) | (Value::Number(y), Value::Int(x)) => {
                *x as f64 == *y
            }
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Array(x), Value::Array(y)) => {
                let (xa, ya) = (x.lock(), y.lock());
                xa.len() == ya.len()
                    && xa.iter().zip(ya.iter()).all(|(l, r)| Value::values_equal(l, r))
            }
            (Value::Map(x), Value::Map(y)) => Arc::ptr_eq(x, y),
            (Value::Function(x), Value::Function(y)) => Arc::ptr_eq(x, y),
            (Value::Native(x), Value::Native(y)) => Arc::ptr_eq(x, y),
            (Value::Bound(ox, nx), Value::Bound(oy, ny)) => {
                nx == ny && Value::values_equal(ox, oy)
            }
            (Value::Module(x), Value::Module(y)) => Arc::ptr_eq(x, y),
            (Value::Channel(x), Value::Channel(y)) => Arc::ptr_eq(x, y),
            (Value::Error(x), Value::Error(y)) => x == y,
            _ => false,
        }
    }
}

/// Integral doubles print without a fractional part (the common scripting
/// convention); anything with a fractional remainder prints in full.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.display_string(), self.type_of())
    }
}

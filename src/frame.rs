//! # Call Frames and Try-Records
//!
//! A [`CallFrame`] is the per-invocation execution context: instruction
//! pointer, the chunk being executed, a private locals vector, and the
//! operand-stack depth at which the callee's argument window began (the
//! unwinding target on return). A [`TryRecord`] is the exception
//! substrate's bookmark: the stack/frame depths to restore on a raise, and
//! the handler to jump to.

use std::sync::Arc;

use crate::chunk::Chunk;
use crate::module::{GlobalsSnapshot, ModuleInstance};
use crate::value::Value;

/// One call activation.
pub struct CallFrame {
    pub ip: usize,
    pub chunk: Arc<Chunk>,
    pub locals: Vec<Value>,
    /// Operand-stack depth this frame's call left behind (after popping the
    /// callee and its arguments); the truncation target on `RETURN` and on
    /// exception unwind past this frame.
    pub slot_base: usize,
    /// The module this frame's function belongs to, if any — `EXPORT`
    /// resolves against this.
    pub owning_module: Option<Arc<ModuleInstance>>,
    /// The caller's `(globals, owning_module)` to restore when this frame
    /// returns or is unwound through, if this call crossed a module
    /// boundary.
    pub restore_globals: Option<(GlobalsSnapshot, Option<Arc<ModuleInstance>>)>,
    pub function_name: String,
}

impl CallFrame {
    pub fn get_local(&self, slot: usize) -> Value {
        self.locals.get(slot).cloned().unwrap_or(Value::Null)
    }

    /// Write `value` into `slot`, growing the locals vector with `Null`
    /// padding if the compiler emitted a slot past the current length.
    pub fn set_local(&mut self, slot: usize, value: Value) {
        if slot >= self.locals.len() {
            self.locals.resize(slot + 1, Value::Null);
        }
        self.locals[slot] = value;
    }
}

/// A protected-region bookmark pushed by `TRY`, popped on normal exit or
/// consumed by a raise.
#[derive(Debug, Clone, Copy)]
pub struct TryRecord {
    pub catch_ip: usize,
    pub stack_depth_at_entry: usize,
    pub frame_depth_at_entry: usize,
}

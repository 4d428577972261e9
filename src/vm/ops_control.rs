//! # Branches, Type Queries, and the Module Boundary
//!
//! `JUMP`/`JUMP_IF_FALSE`/`LOOP` (pure instruction-pointer arithmetic),
//! `TYPEOF`/`IS_TYPE`, and `IMPORT`/`EXPORT`. `CALL`/`RETURN`/`TRY`/`THROW`
//! need enough of the frame stack, try-stack and globals-swap machinery
//! that they're implemented directly in `vm::mod` rather than here.

use std::sync::Arc;

use super::pop;
use crate::error::RuntimeError;
use crate::module::{is_path_like, ModuleInstance, ModuleLoader, ModuleRegistry};
use crate::value::Value;

pub(super) fn handle_jump(target: usize, ip: &mut usize) {
    *ip = target;
}

/// Jumps to `target` when `cond` is falsy. The condition is popped by the
/// caller beforehand so this can run without borrowing the operand stack
/// and the owning frame's instruction pointer at once.
pub(super) fn handle_jump_if_false(target: usize, cond: &Value, ip: &mut usize) {
    if !cond.is_truthy() {
        *ip = target;
    }
}

/// `LOOP`: unconditional backward jump, same mechanics as `JUMP` under a
/// different mnemonic so disassembly reads intention rather than direction.
pub(super) fn handle_loop(target: usize, ip: &mut usize) {
    *ip = target;
}

pub(super) fn handle_typeof(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    stack.push(Value::str(v.type_of()));
    Ok(())
}

pub(super) fn handle_is_type(name: &str, stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    stack.push(Value::Bool(v.is_type(name)));
    Ok(())
}

/// `IMPORT name`: a bare name resolves against the VM's own module
/// registry (built-in modules registered at construction); a path-like
/// name goes through the host's [`ModuleLoader`]. Either way, a second
/// import of the same key returns the cached instance rather than
/// re-running it.
pub(super) fn handle_import(
    name: &str,
    registry: &ModuleRegistry,
    loader: &dyn ModuleLoader,
) -> Result<Value, RuntimeError> {
    if let Some(cached) = registry.get_cached(name) {
        return Ok(Value::Module(cached));
    }
    let module: Arc<ModuleInstance> = if is_path_like(name) {
        loader.load(name)?
    } else {
        return Err(RuntimeError::Native(format!("unknown built-in module '{name}'")));
    };
    registry.insert(name, module.clone());
    Ok(Value::Module(module))
}

/// `EXPORT name`: record the top-of-stack value under `name` on the
/// current module, without consuming it — the value remains on top of the
/// stack so the surrounding statement (an assignment, typically) can still
/// consume it normally. Only meaningful while executing inside a
/// module-owned function; the caller resolves which module that is.
pub(super) fn handle_export(
    name: &str,
    stack: &mut [Value],
    module: Option<&Arc<ModuleInstance>>,
) -> Result<(), RuntimeError> {
    let value = stack
        .last()
        .cloned()
        .ok_or_else(|| RuntimeError::Native("stack underflow on EXPORT".to_string()))?;
    match module {
        Some(m) => {
            m.export(name, value);
            Ok(())
        }
        None => Err(RuntimeError::Native(
            "EXPORT used outside of a module context".to_string(),
        )),
    }
}

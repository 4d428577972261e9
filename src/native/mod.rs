//! # Native Bridge
//!
//! The registry of host-implemented callables and the marshalling
//! convention that moves arguments off the operand stack into the host and
//! pushes results back.
//!
//! The registry is assembled once at VM construction (see
//! [`NativeRegistry::with_default_catalogue`]) and never mutated during
//! execution; it is shared read-only (behind an `Arc`) with every VM state
//! a `SPAWN` produces, matching `spec.md` §5's "the two VMs share the
//! native registry (which is read-only once constructed)".

pub mod builtins;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::module::ModuleInstance;
use crate::value::{NativeFunction, Value};

/// Name→callable table. Construction-time only; read-only thereafter.
pub struct NativeRegistry {
    functions: HashMap<String, Arc<NativeFunction>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        NativeRegistry {
            functions: HashMap::new(),
        }
    }

    /// `registration: (name, declared_arity, impl) -> unit` from `spec.md` §6.
    pub fn register<F>(&mut self, name: impl Into<String>, declared_arity: i32, imp: F)
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.functions.insert(
            name.clone(),
            Arc::new(NativeFunction {
                name,
                declared_arity,
                imp: Box::new(imp),
            }),
        );
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<NativeFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Arc<NativeFunction>)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }

    /// The engine's full catalogue plus every library in `spec.md` §4.9:
    /// `math`, `string`, `collection`, `io`, `time`, and the `error` helpers.
    pub fn with_default_catalogue() -> Self {
        let mut reg = NativeRegistry::new();
        builtins::register_all(&mut reg);
        reg
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        NativeRegistry::with_default_catalogue()
    }
}

/// Groups the registry's dotted-name catalogue (`"math.sqrt"`,
/// `"string.upper"`, ...) into one [`ModuleInstance`] per prefix, exporting
/// each entry under its bare suffix. This is what makes `IMPORT "math"`
/// resolve per `spec.md` §4.5: bare names hit a built-in module registry
/// "populated from the native bridge" — the VM builds these once at
/// construction and seeds its [`crate::module::ModuleRegistry`] cache with
/// them, so `IMPORT` itself never needs to know about natives at all.
pub fn build_builtin_modules(registry: &NativeRegistry) -> HashMap<String, Arc<ModuleInstance>> {
    let mut modules: HashMap<String, Arc<ModuleInstance>> = HashMap::new();
    for (full_name, func) in registry.entries() {
        let Some((prefix, suffix)) = full_name.split_once('.') else {
            continue;
        };
        let module = modules
            .entry(prefix.to_string())
            .or_insert_with(|| ModuleInstance::new(prefix))
            .clone();
        module.export(suffix, Value::Native(func.clone()));
        module.loaded.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    modules
}

/// Invoke a native function, marshalling arguments in and the result (or
/// error) back out, per the calling convention in `spec.md` §6. A panic
/// escaping the native implementation is caught and turned into a
/// `RuntimeError::Native`, exactly as if the native had returned an error
/// — the contract explicitly treats the two identically.
pub fn call_native(native: &NativeFunction, args: &[Value]) -> Result<Value, RuntimeError> {
    if native.declared_arity >= 0 && args.len() != native.declared_arity as usize {
        return Err(RuntimeError::Arity(format!(
            "{} expects {} argument(s), got {}",
            native.name,
            native.declared_arity,
            args.len()
        )));
    }
    let result = catch_unwind(AssertUnwindSafe(|| (native.imp)(args)));
    match result {
        Ok(r) => r,
        Err(_) => Err(RuntimeError::Native(format!(
            "native function '{}' panicked",
            native.name
        ))),
    }
}

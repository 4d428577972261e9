//! # Globals, Modules, and the Import Context Switch
//!
//! Globals are stored as a vector indexed by a name→index map — one
//! resolve to learn the slot, O(1) access after that. Each [`ModuleInstance`]
//! owns its own `(values, index)` pair; at a cross-module call boundary the
//! VM swaps its active pointer for the duration of the call and restores it
//! unconditionally on return, even through exception unwind.
//!
//! `IMPORT` of a path-like name goes through a host-supplied
//! [`ModuleLoader`] (file loading itself is out of scope); bare names hit
//! the VM's built-in module registry, populated from the native bridge at
//! construction time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RuntimeError;
use crate::value::Value;

/// The `(values, name→index)` pair backing one globals namespace.
#[derive(Default)]
pub struct GlobalsTable {
    pub values: Vec<Value>,
    pub index: HashMap<String, usize>,
}

impl GlobalsTable {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.index.get(name).map(|&i| self.values[i].clone())
    }

    /// `DEFINE_GLOBAL`: always allocates a fresh slot at the tail.
    pub fn define(&mut self, name: &str, value: Value) {
        let idx = self.values.len();
        self.values.push(value);
        self.index.insert(name.to_string(), idx);
    }

    /// `SET_GLOBAL`: overwrites an existing slot, or allocates one — the
    /// compiler may treat assignment as implicit declaration.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(&idx) = self.index.get(name) {
            self.values[idx] = value;
        } else {
            self.define(name, value);
        }
    }
}

/// A shared handle to one globals namespace. Cloning is cheap (`Arc` bump);
/// this is what a [`crate::frame::CallFrame`] captures to restore the
/// caller's module context on return.
pub type GlobalsSnapshot = Arc<RwLock<GlobalsTable>>;

/// A named bundle of globals and exports with its own globals vector.
pub struct ModuleInstance {
    pub name: String,
    pub exports: RwLock<HashMap<String, Value>>,
    pub globals: GlobalsSnapshot,
    pub loaded: std::sync::atomic::AtomicBool,
}

impl ModuleInstance {
    pub fn new(name: impl Into<String>) -> Arc<ModuleInstance> {
        Arc::new(ModuleInstance {
            name: name.into(),
            exports: RwLock::new(HashMap::new()),
            globals: Arc::new(RwLock::new(GlobalsTable::default())),
            loaded: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// `EXPORT name`: record the current top-of-stack value under `name`.
    pub fn export(&self, name: &str, value: Value) {
        self.exports.write().insert(name.to_string(), value);
    }

    pub fn exports_as_map(&self) -> Value {
        Value::map(self.exports.read().clone())
    }
}

/// External collaborator that resolves a path-like `IMPORT` target into an
/// executed module. File loading itself is out of scope for this crate;
/// hosts implement this trait however they load scripts.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Arc<ModuleInstance>, RuntimeError>;
}

/// A loader that always fails; the default when a host hasn't wired one in.
/// `IMPORT` of a bare (built-in) name never reaches this path.
pub struct NoopLoader;

impl ModuleLoader for NoopLoader {
    fn load(&self, path: &str) -> Result<Arc<ModuleInstance>, RuntimeError> {
        Err(RuntimeError::Native(format!(
            "no module loader configured; cannot import '{path}'"
        )))
    }
}

/// Per-VM cache of resolved modules, keyed by the resolved path or bare
/// name. Re-importing the same key returns the cached handle rather than
/// re-executing it (see `SPEC_FULL.md` §3, `IMPORT` caching resolution).
#[derive(Default)]
pub struct ModuleRegistry {
    cache: RwLock<HashMap<String, Arc<ModuleInstance>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry::default()
    }

    pub fn get_cached(&self, key: &str) -> Option<Arc<ModuleInstance>> {
        self.cache.read().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, module: Arc<ModuleInstance>) {
        self.cache.write().insert(key.into(), module);
    }
}

/// Does `name` look like a file path rather than a bare built-in module
/// name (contains a path separator or a source-file extension)?
pub fn is_path_like(name: &str) -> bool {
    name.contains('/') || name.contains('\\') || name.ends_with(".ember") || name.ends_with(".es")
}

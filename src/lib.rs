//! Ember VM: an embeddable stack-based bytecode execution engine.
//!
//! This crate is the execution core of a dynamically-typed scripting
//! language runtime — value model, call frames, exception unwinding,
//! iteration protocol, module/export context switching, and the native
//! function calling convention. It has no compiler, no CLI, and no file
//! loading of its own: callers hand it an already-assembled [`Chunk`] (see
//! [`ChunkBuilder`]) and a [`Vm`] to run it on.

pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod module;
pub mod native;
pub mod value;
pub mod vm;

pub use chunk::{Chunk, ChunkBuilder, OpCode};
pub use config::VmConfig;
pub use diagnostics::{DebugHooks, Diagnostics, InstructionEvent};
pub use error::{EngineFault, RuntimeError};
pub use frame::{CallFrame, TryRecord};
pub use module::{GlobalsSnapshot, GlobalsTable, ModuleInstance, ModuleLoader, ModuleRegistry, NoopLoader};
pub use native::{call_native, NativeRegistry};
pub use value::{Channel, ErrorObject, IteratorKind, IteratorState, NativeFunction, UserFunction, Value};
pub use vm::Vm;

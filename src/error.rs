//! # Error Taxonomy for the Ember VM
//!
//! This module defines the two error families used throughout the engine.
//!
//! ## Design
//! - [`RuntimeError`] covers every failure a script can recover from with a
//!   `TRY`/`THROW` pair: type mismatches, arity mismatches, out-of-bounds
//!   writes, division by zero, and anything a native function reports.
//! - [`EngineFault`] covers the two failures the engine treats as fatal:
//!   the instruction ceiling tripping, and a violated internal invariant
//!   (the compiler's contract broken, a malformed chunk). Neither is
//!   catchable; both exit [`crate::vm::Vm::run`] directly.
//!
//! A [`RuntimeError`] that reaches the top of the frame stack with no
//! surviving try-record is wrapped into [`EngineFault::Unhandled`] so the
//! host always gets a single fault type back from `run`.

use thiserror::Error;

/// Errors a script can catch with `TRY`. See `spec.md` §7 for the taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("ArityError: {0}")]
    Arity(String),

    #[error("BoundsError: {0}")]
    Bounds(String),

    #[error("DivisionByZero: division by zero")]
    DivisionByZero,

    #[error("StackOverflow: {0}")]
    StackOverflow(String),

    #[error("NativeError: {0}")]
    Native(String),
}

impl RuntimeError {
    /// The message a catch handler's `error.message` field should carry.
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Type(m)
            | RuntimeError::Arity(m)
            | RuntimeError::Bounds(m)
            | RuntimeError::StackOverflow(m)
            | RuntimeError::Native(m) => m.clone(),
            RuntimeError::DivisionByZero => "division by zero".to_string(),
        }
    }

    /// Short tag matching the taxonomy names in the error handling design.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RuntimeError::Type(_) => "TypeError",
            RuntimeError::Arity(_) => "ArityError",
            RuntimeError::Bounds(_) => "BoundsError",
            RuntimeError::DivisionByZero => "DivisionByZero",
            RuntimeError::StackOverflow(_) => "StackOverflow",
            RuntimeError::Native(_) => "NativeError",
        }
    }
}

/// Errors that exit [`crate::vm::Vm::run`] unconditionally; never catchable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineFault {
    #[error("ExecutionLimit: instruction ceiling exceeded")]
    ExecutionLimit,

    #[error("InternalError: {0}")]
    Internal(String),

    #[error("{0}")]
    Unhandled(RuntimeError),
}

impl From<RuntimeError> for EngineFault {
    fn from(e: RuntimeError) -> Self {
        EngineFault::Unhandled(e)
    }
}

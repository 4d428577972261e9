//! # Debug Hooks and Tracing
//!
//! Two diagnostic surfaces, unified under one [`Diagnostics`] struct owned
//! by the VM:
//!
//! - Structured `log` events on lifecycle transitions (frame push/pop,
//!   module swap, caught exception, fatal fault) — zero-cost when no
//!   subscriber is installed, since the `log` facade short-circuits at the
//!   call site.
//! - The four debug-hook callbacks from `spec.md` §6: per-instruction
//!   (pre-fetch), per-call, per-return, per-error. When none are attached,
//!   the dispatcher's hot path degrades to a single `is_some()` check.

/// What a per-instruction hook sees before an opcode is dispatched.
pub struct InstructionEvent<'a> {
    pub ip: usize,
    pub opcode: u8,
    pub function_name: &'a str,
}

/// Optional callbacks a host can attach to observe execution. Absent by
/// default; attaching any of them costs one branch per dispatch.
#[derive(Default)]
pub struct DebugHooks {
    pub on_instruction: Option<Box<dyn FnMut(&InstructionEvent) + Send>>,
    pub on_call: Option<Box<dyn FnMut(&str) + Send>>,
    pub on_return: Option<Box<dyn FnMut(&str) + Send>>,
    pub on_error: Option<Box<dyn FnMut(&str) + Send>>,
}

impl DebugHooks {
    pub fn is_empty(&self) -> bool {
        self.on_instruction.is_none()
            && self.on_call.is_none()
            && self.on_return.is_none()
            && self.on_error.is_none()
    }
}

/// Owns the VM's debug hook table. `log` calls live directly at their call
/// sites (`log::trace!`, `log::warn!`, ...) rather than behind this
/// struct, matching the facade's own zero-cost-when-disabled design.
#[derive(Default)]
pub struct Diagnostics {
    pub hooks: DebugHooks,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    #[inline]
    pub fn fire_instruction(&mut self, ip: usize, opcode: u8, function_name: &str) {
        if let Some(cb) = self.hooks.on_instruction.as_mut() {
            cb(&InstructionEvent {
                ip,
                opcode,
                function_name,
            });
        }
    }

    #[inline]
    pub fn fire_call(&mut self, name: &str) {
        if let Some(cb) = self.hooks.on_call.as_mut() {
            cb(name);
        }
    }

    #[inline]
    pub fn fire_return(&mut self, name: &str) {
        if let Some(cb) = self.hooks.on_return.as_mut() {
            cb(name);
        }
    }

    #[inline]
    pub fn fire_error(&mut self, message: &str) {
        if let Some(cb) = self.hooks.on_error.as_mut() {
            cb(message);
        }
    }
}

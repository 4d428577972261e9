//! # VM Configuration
//!
//! Everything `spec.md` calls "implementation-chosen": the instruction
//! ceiling, initial stack capacity, and default channel buffer size.
//! Built programmatically (no CLI/file parsing — that stays out of
//! scope) but shaped so a host can fill it in from one.

/// Tunables for one [`crate::vm::Vm`] instance.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Hard ceiling on dispatched instructions before `Run` raises
    /// `EngineFault::ExecutionLimit`. Protection against runaway loops,
    /// not a security boundary (`spec.md` §4.3).
    pub instruction_limit: u64,
    pub initial_stack_capacity: usize,
    pub initial_frame_capacity: usize,
    pub default_channel_capacity: usize,
    pub max_frame_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            instruction_limit: 100_000_000,
            initial_stack_capacity: 256,
            initial_frame_capacity: 64,
            default_channel_capacity: 16,
            max_frame_depth: 2_048,
        }
    }
}

impl VmConfig {
    pub fn new() -> Self {
        VmConfig::default()
    }

    pub fn with_instruction_limit(mut self, limit: u64) -> Self {
        self.instruction_limit = limit;
        self
    }

    pub fn with_max_frame_depth(mut self, depth: usize) -> Self {
        self.max_frame_depth = depth;
        self
    }

    pub fn with_default_channel_capacity(mut self, capacity: usize) -> Self {
        self.default_channel_capacity = capacity;
        self
    }
}

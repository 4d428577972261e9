//! # The Virtual Machine
//!
//! [`Vm`] owns every piece of mutable execution state: the operand stack,
//! the call-frame stack, the exception substrate's try-stack, the
//! iteration stack, the active globals pointer, and the native and module
//! registries. [`Vm::run`] is the fetch/decode/dispatch loop: it reads one
//! opcode byte from the current frame's chunk, decodes its immediates, and
//! dispatches to a handler in one of the `ops_*` submodules.
//!
//! A script fault that finds no surviving [`TryRecord`] is wrapped into
//! [`EngineFault::Unhandled`]; the instruction ceiling tripping or a
//! decode-time bounds violation surface directly as the other
//! [`EngineFault`] variants. Both exit `run` immediately.

mod ops_arith;
mod ops_collection;
mod ops_concurrency;
mod ops_control;
mod ops_iter;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::chunk::{Chunk, OpCode};
use crate::config::VmConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{EngineFault, RuntimeError};
use crate::frame::{CallFrame, TryRecord};
use crate::module::{GlobalsSnapshot, GlobalsTable, ModuleInstance, ModuleLoader, ModuleRegistry, NoopLoader};
use crate::native::{call_native, NativeRegistry};
use crate::value::{IteratorState, Value};

/// Pop a single value off the operand stack, or fail with a catchable
/// error — reaching stack underflow means a malformed chunk, but the
/// engine treats it the same way the rest of the `RuntimeError` family is
/// treated rather than promoting it to a fatal fault.
pub(crate) fn pop(stack: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    stack
        .pop()
        .ok_or_else(|| RuntimeError::Native("stack underflow".to_string()))
}

/// Unifies the two kinds of failure a dispatch step can produce: a
/// catchable [`RuntimeError`] that the exception substrate may intercept,
/// or an [`EngineFault`] that unwinds `run` unconditionally. Letting `?`
/// convert both into this type is what keeps the opcode handlers terse.
enum Signal {
    Runtime(RuntimeError),
    Fault(EngineFault),
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Runtime(e)
    }
}

impl From<EngineFault> for Signal {
    fn from(e: EngineFault) -> Self {
        Signal::Fault(e)
    }
}

/// One virtual machine: its own stacks, its own module cache, a shared
/// (read-only) native registry. Constructed fresh for the top-level script
/// and for every `SPAWN`-ed child task.
pub struct Vm {
    config: VmConfig,
    natives: Arc<NativeRegistry>,
    modules: ModuleRegistry,
    loader: Arc<dyn ModuleLoader>,
    active_globals: GlobalsSnapshot,
    active_module: Option<Arc<ModuleInstance>>,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    try_stack: Vec<TryRecord>,
    iter_stack: Vec<IteratorState>,
    instruction_count: u64,
    diagnostics: Diagnostics,
}

impl Vm {
    pub fn new(config: VmConfig) -> Vm {
        Vm::with_natives(config, Arc::new(NativeRegistry::with_default_catalogue()))
    }

    pub fn with_natives(config: VmConfig, natives: Arc<NativeRegistry>) -> Vm {
        let stack = Vec::with_capacity(config.initial_stack_capacity);
        let frames = Vec::with_capacity(config.initial_frame_capacity);
        let modules = ModuleRegistry::new();
        for (name, module) in crate::native::build_builtin_modules(&natives) {
            modules.insert(name, module);
        }
        Vm {
            config,
            natives,
            modules,
            loader: Arc::new(NoopLoader),
            active_globals: Arc::new(RwLock::new(GlobalsTable::default())),
            active_module: None,
            stack,
            frames,
            try_stack: Vec::new(),
            iter_stack: Vec::new(),
            instruction_count: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn globals(&self) -> GlobalsSnapshot {
        self.active_globals.clone()
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Runs `chunk` as a top-level script: pushes an entry frame and
    /// executes until the frame stack drains, returning whatever value the
    /// entry frame's `RETURN` left on the stack (`Null` if the chunk never
    /// explicitly returns one).
    pub fn run(&mut self, chunk: Arc<Chunk>) -> Result<Value, EngineFault> {
        self.frames.push(CallFrame {
            ip: 0,
            chunk,
            locals: Vec::new(),
            slot_base: 0,
            owning_module: self.active_module.clone(),
            restore_globals: None,
            function_name: "<script>".to_string(),
        });
        self.execute()
    }

    fn execute(&mut self) -> Result<Value, EngineFault> {
        loop {
            if self.frames.is_empty() {
                return Ok(self.stack.pop().unwrap_or(Value::Null));
            }

            self.instruction_count += 1;
            if self.instruction_count > self.config.instruction_limit {
                log::error!("fatal engine fault: instruction ceiling {} exceeded", self.config.instruction_limit);
                return Err(EngineFault::ExecutionLimit);
            }

            let op_byte = self.fetch_u8()?;
            let opcode = OpCode::from_u8(op_byte)
                .ok_or_else(|| EngineFault::Internal(format!("invalid opcode byte {op_byte}")))?;

            if !self.diagnostics.hooks.is_empty() {
                let frame = self.frames.last().unwrap();
                self.diagnostics
                    .fire_instruction(frame.ip, op_byte, &frame.function_name);
            }

            match self.dispatch(opcode) {
                Ok(()) => {}
                Err(Signal::Fault(f)) => {
                    log::error!("fatal engine fault: {f}");
                    return Err(f);
                }
                Err(Signal::Runtime(err)) => {
                    self.diagnostics.fire_error(&err.message());
                    if !self.unwind_to_handler(err.clone()) {
                        log::error!("unhandled fault: {err}");
                        return Err(EngineFault::Unhandled(err));
                    }
                }
            }
        }
    }

    fn fetch_u8(&mut self) -> Result<u8, EngineFault> {
        let frame = self.frames.last_mut().expect("fetch with no active frame");
        let byte = frame.chunk.read_u8(frame.ip)?;
        frame.ip += 1;
        Ok(byte)
    }

    fn fetch_u16(&mut self) -> Result<u16, EngineFault> {
        let frame = self.frames.last_mut().expect("fetch with no active frame");
        let v = frame.chunk.read_u16_be(frame.ip)?;
        frame.ip += 2;
        Ok(v)
    }

    fn fetch_const(&self, idx: u8) -> Result<Value, EngineFault> {
        self.frames.last().unwrap().chunk.constant(idx as usize)
    }

    fn name_const(&self, idx: u8) -> Result<String, EngineFault> {
        match self.fetch_const(idx)? {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(EngineFault::Internal(format!(
                "expected string constant, got {}",
                other.type_of()
            ))),
        }
    }

    fn dispatch(&mut self, opcode: OpCode) -> Result<(), Signal> {
        use OpCode::*;
        match opcode {
            Const => {
                let idx = self.fetch_u8()?;
                let v = self.fetch_const(idx)?;
                self.stack.push(v);
            }
            Nil => self.stack.push(Value::Null),
            Dup => {
                let v = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| RuntimeError::Native("stack underflow on DUP".to_string()))?;
                self.stack.push(v);
            }
            Pop => {
                pop(&mut self.stack)?;
            }

            Add => ops_arith::handle_add(&mut self.stack)?,
            Sub => ops_arith::handle_sub(&mut self.stack)?,
            Mul => ops_arith::handle_mul(&mut self.stack)?,
            Div => ops_arith::handle_div(&mut self.stack)?,
            Mod => ops_arith::handle_mod(&mut self.stack)?,
            Neg => ops_arith::handle_neg(&mut self.stack)?,
            And => ops_arith::handle_and(&mut self.stack)?,
            Or => ops_arith::handle_or(&mut self.stack)?,
            Not => ops_arith::handle_not(&mut self.stack)?,
            Eq => ops_arith::handle_eq(&mut self.stack)?,
            Neq => ops_arith::handle_neq(&mut self.stack)?,
            Lt => ops_arith::handle_lt(&mut self.stack)?,
            Le => ops_arith::handle_le(&mut self.stack)?,
            Gt => ops_arith::handle_gt(&mut self.stack)?,
            Ge => ops_arith::handle_ge(&mut self.stack)?,

            GetLocal => {
                let slot = self.fetch_u8()? as usize;
                let v = self.frames.last().unwrap().get_local(slot);
                self.stack.push(v);
            }
            SetLocal => {
                let slot = self.fetch_u8()? as usize;
                let v = pop(&mut self.stack)?;
                self.frames.last_mut().unwrap().set_local(slot, v);
            }
            GetGlobal => {
                let idx = self.fetch_u8()?;
                let name = self.name_const(idx)?;
                let v = self
                    .active_globals
                    .read()
                    .get(&name)
                    .ok_or_else(|| RuntimeError::Type(format!("undefined global '{name}'")))?;
                self.stack.push(v);
            }
            SetGlobal => {
                let idx = self.fetch_u8()?;
                let name = self.name_const(idx)?;
                let v = pop(&mut self.stack)?;
                self.active_globals.write().set(&name, v);
            }
            DefineGlobal => {
                let idx = self.fetch_u8()?;
                let name = self.name_const(idx)?;
                let v = pop(&mut self.stack)?;
                self.active_globals.write().define(&name, v);
            }

            Array => {
                let n = self.fetch_u16()? as usize;
                ops_collection::handle_array(n, &mut self.stack)?;
            }
            Map => {
                let n = self.fetch_u16()? as usize;
                ops_collection::handle_map(n, &mut self.stack)?;
            }
            Index => ops_collection::handle_index(&mut self.stack)?,
            SetIndex => ops_collection::handle_set_index(&mut self.stack)?,
            ArrayLen => ops_collection::handle_array_len(&mut self.stack)?,
            StringLen => ops_collection::handle_string_len(&mut self.stack)?,
            MapKeys => ops_collection::handle_map_keys(&mut self.stack)?,
            MapValues => ops_collection::handle_map_values(&mut self.stack)?,
            MapDelete => ops_collection::handle_map_delete(&mut self.stack)?,
            MapGet => ops_collection::handle_map_get(&mut self.stack)?,
            MapSet => ops_collection::handle_map_set(&mut self.stack)?,
            Concat => ops_collection::handle_concat(&mut self.stack)?,

            Jump => {
                let target = self.fetch_u16()? as usize;
                self.frames.last_mut().unwrap().ip = target;
            }
            JumpIfFalse => {
                let target = self.fetch_u16()? as usize;
                let cond = pop(&mut self.stack)?;
                ops_control::handle_jump_if_false(target, &cond, &mut self.frames.last_mut().unwrap().ip);
            }
            Loop => {
                let target = self.fetch_u16()? as usize;
                self.frames.last_mut().unwrap().ip = target;
            }

            IterStart => ops_iter::handle_iter_start(&mut self.stack, &mut self.iter_stack)?,
            IterNext => ops_iter::handle_iter_next(&mut self.stack, &mut self.iter_stack)?,
            IterEnd => ops_iter::handle_iter_end(&mut self.iter_stack)?,

            Call => {
                let argc = self.fetch_u8()? as usize;
                self.do_call(argc)?;
            }
            Return => self.do_return()?,

            Try => {
                let catch_ip = self.fetch_u16()? as usize;
                self.try_stack.push(TryRecord {
                    catch_ip,
                    stack_depth_at_entry: self.stack.len(),
                    frame_depth_at_entry: self.frames.len(),
                });
            }
            Throw => self.do_throw()?,

            TypeOf => ops_control::handle_typeof(&mut self.stack)?,
            IsType => {
                let idx = self.fetch_u8()?;
                let name = self.name_const(idx)?;
                ops_control::handle_is_type(&name, &mut self.stack)?;
            }
            Import => {
                let idx = self.fetch_u8()?;
                let name = self.name_const(idx)?;
                let v = ops_control::handle_import(&name, &self.modules, self.loader.as_ref())?;
                self.stack.push(v);
            }
            Export => {
                let idx = self.fetch_u8()?;
                let name = self.name_const(idx)?;
                let module = self.frames.last().unwrap().owning_module.clone();
                ops_control::handle_export(&name, &mut self.stack, module.as_ref())?;
            }

            Spawn => self.do_spawn()?,
            ChannelNew => {
                ops_concurrency::handle_channel_new(&mut self.stack, self.config.default_channel_capacity)?
            }
            ChannelSend => ops_concurrency::handle_channel_send(&mut self.stack)?,
            ChannelRecv => ops_concurrency::handle_channel_recv(&mut self.stack)?,
        }
        Ok(())
    }

    /// `CALL argc`: dispatches on the callee popped from beneath the
    /// argument window — a user function pushes a new frame (swapping
    /// globals if it crosses into a different module), a native runs
    /// in-line, a bound method re-dispatches with the receiver prepended,
    /// and anything else is a catchable type error.
    fn do_call(&mut self, argc: usize) -> Result<(), Signal> {
        if self.stack.len() < argc + 1 {
            return Err(RuntimeError::Native("stack underflow on CALL".to_string()).into());
        }
        let mut args = self.stack.split_off(self.stack.len() - argc);
        let callee = self.stack.pop().unwrap();
        let slot_base = self.stack.len();

        match callee {
            Value::Function(f) => {
                if self.frames.len() >= self.config.max_frame_depth {
                    return Err(RuntimeError::StackOverflow(format!(
                        "exceeded max frame depth {}",
                        self.config.max_frame_depth
                    ))
                    .into());
                }
                if !f.is_variadic && args.len() != f.arity {
                    return Err(RuntimeError::Arity(format!(
                        "{} expects {} argument(s), got {}",
                        f.name,
                        f.arity,
                        args.len()
                    ))
                    .into());
                }
                let restore = match &f.owning_module {
                    Some(m) if !Arc::ptr_eq(&m.globals, &self.active_globals) => {
                        let prev = (self.active_globals.clone(), self.active_module.clone());
                        log::debug!("module swap: entering '{}' for call to '{}'", m.name, f.name);
                        self.active_globals = m.globals.clone();
                        self.active_module = Some(m.clone());
                        Some(prev)
                    }
                    _ => None,
                };
                self.diagnostics.fire_call(&f.name);
                log::trace!("push frame '{}' (depth {})", f.name, self.frames.len() + 1);
                self.frames.push(CallFrame {
                    ip: 0,
                    chunk: f.chunk.clone(),
                    locals: std::mem::take(&mut args),
                    slot_base,
                    owning_module: f.owning_module.clone(),
                    restore_globals: restore,
                    function_name: f.name.clone(),
                });
                Ok(())
            }
            Value::Native(nf) => {
                let result = call_native(&nf, &args)?;
                self.stack.push(result);
                Ok(())
            }
            Value::Bound(receiver, method_name) => {
                // The method name resolves through the native registry, not
                // through the receiver's own entries: `arr["push"]` yields a
                // `Bound(array, "push")`, and `CALL` looks up `array.push`
                // here, prepending the receiver to the argument list.
                let prefix = receiver.type_of();
                let full_name = format!("{prefix}.{method_name}");
                let native = self.natives.lookup(&full_name).ok_or_else(|| {
                    RuntimeError::Type(format!("no method '{method_name}' on {prefix}"))
                })?;
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(*receiver);
                call_args.append(&mut args);
                let result = call_native(&native, &call_args)?;
                self.stack.push(result);
                Ok(())
            }
            other => Err(RuntimeError::Type(format!("{} is not callable", other.type_of())).into()),
        }
    }

    /// `RETURN`: pop the return value, pop the frame, truncate the operand
    /// stack to the slot it occupied at call time, restore the caller's
    /// globals if this call crossed a module boundary, then push the
    /// return value back.
    fn do_return(&mut self) -> Result<(), Signal> {
        let value = pop(&mut self.stack)?;
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| EngineFault::Internal("RETURN with no active frame".to_string()))?;
        self.stack.truncate(frame.slot_base);
        log::trace!("pop frame '{}' (depth {})", frame.function_name, self.frames.len() + 1);
        if let Some((globals, module)) = frame.restore_globals {
            if let Some(m) = &self.active_module {
                log::debug!("module swap: leaving '{}' on return from '{}'", m.name, frame.function_name);
            }
            self.active_globals = globals;
            self.active_module = module;
        }
        self.diagnostics.fire_return(&frame.function_name);
        self.stack.push(value);
        Ok(())
    }

    /// `THROW`: convert the top-of-stack value into a [`RuntimeError`] and
    /// raise it. An `Error` value maps back to its original kind where
    /// recognized; anything else becomes a native-style message error.
    fn do_throw(&mut self) -> Result<(), Signal> {
        let v = pop(&mut self.stack)?;
        let err = match &v {
            Value::Error(e) => match e.kind.as_str() {
                "TypeError" => RuntimeError::Type(e.message.clone()),
                "ArityError" => RuntimeError::Arity(e.message.clone()),
                "BoundsError" => RuntimeError::Bounds(e.message.clone()),
                "DivisionByZero" => RuntimeError::DivisionByZero,
                "StackOverflow" => RuntimeError::StackOverflow(e.message.clone()),
                _ => RuntimeError::Native(e.message.clone()),
            },
            other => RuntimeError::Native(other.display_string()),
        };
        Err(err.into())
    }

    /// Unwinds the frame stack to the nearest surviving [`TryRecord`],
    /// restoring globals for every frame discarded along the way, and
    /// leaves the caught error (as a `Value::Error`) on top of the operand
    /// stack for the handler to consume. Returns `false` if no try-record
    /// survives, meaning the error is unhandled.
    fn unwind_to_handler(&mut self, err: RuntimeError) -> bool {
        while let Some(rec) = self.try_stack.pop() {
            if rec.frame_depth_at_entry > self.frames.len() {
                continue;
            }
            while self.frames.len() > rec.frame_depth_at_entry {
                let frame = self.frames.pop().unwrap();
                if let Some((globals, module)) = frame.restore_globals {
                    self.active_globals = globals;
                    self.active_module = module;
                }
            }
            self.stack.truncate(rec.stack_depth_at_entry);
            log::warn!("caught exception: {err}");
            self.stack.push(Value::from_runtime_error(&err));
            if let Some(frame) = self.frames.last_mut() {
                frame.ip = rec.catch_ip;
            }
            return true;
        }
        false
    }

    /// `SPAWN`: pop a zero-argument function and run it to completion on a
    /// fresh OS thread, inside a brand-new child `Vm` that shares this
    /// VM's (read-only) native registry but gets its own stacks and module
    /// cache. Fire-and-forget: the opcode itself always succeeds and
    /// leaves `Null` on the stack; a fault inside the child is logged, not
    /// propagated.
    fn do_spawn(&mut self) -> Result<(), Signal> {
        let callee = pop(&mut self.stack)?;
        let f = match callee {
            Value::Function(f) => f,
            other => return Err(RuntimeError::Type(format!("{} is not spawnable", other.type_of())).into()),
        };
        if !f.is_variadic && f.arity != 0 {
            return Err(RuntimeError::Arity(format!(
                "spawn target '{}' must take zero arguments",
                f.name
            ))
            .into());
        }

        let natives = self.natives.clone();
        let config = self.config.clone();
        let chunk = f.chunk.clone();
        let name = f.name.clone();
        let owning_module = f.owning_module.clone();

        std::thread::Builder::new()
            .name(format!("spawn:{name}"))
            .spawn(move || {
                let mut child = Vm::with_natives(config, natives);
                if let Some(m) = owning_module {
                    child.active_globals = m.globals.clone();
                    child.active_module = Some(m);
                }
                if let Err(fault) = child.run(chunk) {
                    log::error!("spawned task '{name}' faulted: {fault}");
                }
            })
            .expect("failed to spawn OS thread for SPAWN");

        self.stack.push(Value::Null);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkBuilder;
    use crate::value::UserFunction;

    fn run_chunk(chunk: crate::chunk::Chunk) -> Value {
        let mut vm = Vm::new(VmConfig::default());
        vm.run(Arc::new(chunk)).expect("script should not fault")
    }

    #[test]
    fn literal_arithmetic_evaluates_and_returns() {
        let mut b = ChunkBuilder::new();
        b.op_const(Value::Int(2));
        b.op_const(Value::Int(3));
        b.op(OpCode::Add);
        b.op(OpCode::Return);
        assert!(matches!(run_chunk(b.build()), Value::Int(5)));
    }

    #[test]
    fn undefined_global_read_is_a_catchable_error() {
        let mut b = ChunkBuilder::new();
        let catch_target = 0u16; // patched below
        let try_offset = b.offset();
        b.op(OpCode::Try).u16_be(catch_target);
        let name_idx = b.add_constant(Value::str("missing"));
        b.op(OpCode::GetGlobal).u8(name_idx);
        b.op(OpCode::Return);
        let catch_ip = b.offset();
        b.op(OpCode::Return);
        b.patch_u16_be(try_offset + 1, catch_ip as u16);

        match run_chunk(b.build()) {
            Value::Error(e) => assert_eq!(e.kind, "TypeError"),
            other => panic!("expected a caught error value, got {other:?}"),
        }
    }

    #[test]
    fn recursive_fibonacci_computes_expected_value() {
        // fib(n) = n < 2 ? n : fib(n-1) + fib(n-2), recursing through a
        // global binding since a function's chunk can't hold a constant
        // referencing its own not-yet-built `Arc<UserFunction>`.
        let mut fb = ChunkBuilder::new();
        let name_idx = fb.add_constant(Value::str("fib"));

        fb.op(OpCode::GetLocal).u8(0);
        fb.op_const(Value::Int(2));
        fb.op(OpCode::Lt);
        let jump_if_false_at = fb.offset();
        fb.op(OpCode::JumpIfFalse).u16_be(0); // patched below

        fb.op(OpCode::GetLocal).u8(0);
        fb.op(OpCode::Return);

        let else_branch = fb.offset();
        fb.patch_u16_be(jump_if_false_at + 1, else_branch as u16);

        fb.op(OpCode::GetGlobal).u8(name_idx);
        fb.op(OpCode::GetLocal).u8(0);
        fb.op_const(Value::Int(1));
        fb.op(OpCode::Sub);
        fb.op(OpCode::Call).u8(1);

        fb.op(OpCode::GetGlobal).u8(name_idx);
        fb.op(OpCode::GetLocal).u8(0);
        fb.op_const(Value::Int(2));
        fb.op(OpCode::Sub);
        fb.op(OpCode::Call).u8(1);

        fb.op(OpCode::Add);
        fb.op(OpCode::Return);

        let fib = Arc::new(UserFunction {
            name: "fib".to_string(),
            arity: 1,
            is_variadic: false,
            chunk: Arc::new(fb.build()),
            owning_module: None,
        });

        let mut main = ChunkBuilder::new();
        let main_name_idx = main.add_constant(Value::str("fib"));
        main.op_const(Value::Function(fib));
        main.op(OpCode::DefineGlobal).u8(main_name_idx);
        main.op(OpCode::GetGlobal).u8(main_name_idx);
        main.op_const(Value::Int(7));
        main.op(OpCode::Call).u8(1);
        main.op(OpCode::Return);

        assert!(matches!(run_chunk(main.build()), Value::Int(13)));
    }

    #[test]
    fn importing_a_built_in_module_reaches_its_native_catalogue() {
        let mut b = ChunkBuilder::new();
        let math_idx = b.add_constant(Value::str("math"));
        b.op(OpCode::Import).u8(math_idx);
        b.op_const(Value::str("abs"));
        b.op(OpCode::Index);
        b.op_const(Value::Int(-5));
        b.op(OpCode::Call).u8(1);
        b.op(OpCode::Return);

        match run_chunk(b.build()) {
            Value::Number(n) => assert_eq!(n, 5.0),
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn array_bound_mutator_method_resolves_through_the_native_registry() {
        let array = Value::array(vec![Value::Int(1)]);
        let mut b = ChunkBuilder::new();
        b.op_const(array.clone());
        b.op_const(Value::str("push"));
        b.op(OpCode::Index);
        b.op_const(Value::Int(2));
        b.op(OpCode::Call).u8(1);
        b.op(OpCode::Return);

        assert!(matches!(run_chunk(b.build()), Value::Int(2)));
        match array {
            Value::Array(items) => assert_eq!(items.lock().len(), 2),
            _ => unreachable!(),
        }
    }

    #[test]
    fn spawn_target_must_be_zero_arity() {
        let inner = Arc::new(crate::chunk::Chunk::new(vec![], vec![]));
        let f = Arc::new(UserFunction {
            name: "needs_arg".to_string(),
            arity: 1,
            is_variadic: false,
            chunk: inner,
            owning_module: None,
        });
        let mut b = ChunkBuilder::new();
        b.op_const(Value::Function(f));
        b.op(OpCode::Spawn);
        b.op(OpCode::Return);
        let mut vm = Vm::new(VmConfig::default());
        let err = vm.run(Arc::new(b.build())).unwrap_err();
        assert!(matches!(err, EngineFault::Unhandled(RuntimeError::Arity(_))));
    }
}

//! # Channel Operations
//!
//! `CHANNEL_NEW`/`CHANNEL_SEND`/`CHANNEL_RECV`. `SPAWN` itself lives in
//! `vm::mod` since it needs to construct a whole new [`super::Vm`]; this
//! module only covers the bounded-FIFO channel value that `SPAWN`-ed tasks
//! use to talk back to their parent.
//!
//! Channels are a `parking_lot::Mutex`-guarded `VecDeque` with two
//! `Condvar`s (`not_empty`, `not_full`) — the same primitives the engine
//! uses for its blocking send/receive, modeled on a classic bounded-buffer
//! producer/consumer.

use std::sync::Arc;

use super::pop;
use crate::error::RuntimeError;
use crate::value::{Channel, Value};

pub(super) fn handle_channel_new(
    stack: &mut Vec<Value>,
    default_capacity: usize,
) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    let capacity = match v {
        Value::Int(i) if i > 0 => i as usize,
        Value::Null => default_capacity,
        other => {
            return Err(RuntimeError::Type(format!(
                "channel capacity must be a positive integer, got {}",
                other.type_of()
            )))
        }
    };
    stack.push(Value::Channel(Arc::new(Channel::new(capacity))));
    Ok(())
}

/// Blocks until the channel has room or is closed. Sending on a closed
/// channel is a catchable error, matching a native function's failure mode.
pub(super) fn handle_channel_send(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let value = pop(stack)?;
    let chan = pop(stack)?;
    let chan = match chan {
        Value::Channel(c) => c,
        other => return Err(RuntimeError::Type(format!("{} is not a channel", other.type_of()))),
    };
    let mut state = chan.state.lock();
    loop {
        if state.closed {
            return Err(RuntimeError::Native("send on closed channel".to_string()));
        }
        if state.queue.len() < chan.capacity {
            state.queue.push_back(value);
            chan.not_empty.notify_one();
            stack.push(Value::Null);
            return Ok(());
        }
        chan.not_full.wait(&mut state);
    }
}

/// Blocks until a value is available or the channel is closed and drained,
/// in which case it returns `Null`.
pub(super) fn handle_channel_recv(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let chan = pop(stack)?;
    let chan = match chan {
        Value::Channel(c) => c,
        other => return Err(RuntimeError::Type(format!("{} is not a channel", other.type_of()))),
    };
    let mut state = chan.state.lock();
    loop {
        if let Some(v) = state.queue.pop_front() {
            chan.not_full.notify_one();
            stack.push(v);
            return Ok(());
        }
        if state.closed {
            stack.push(Value::Null);
            return Ok(());
        }
        chan.not_empty.wait(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_receive_round_trips_a_value() {
        let mut stack = vec![Value::Null];
        handle_channel_new(&mut stack, 4).unwrap();
        let chan = stack.pop().unwrap();

        let mut send_stack = vec![chan.clone(), Value::Int(7)];
        handle_channel_send(&mut send_stack).unwrap();
        assert!(matches!(send_stack.pop().unwrap(), Value::Null));

        let mut recv_stack = vec![chan];
        handle_channel_recv(&mut recv_stack).unwrap();
        assert!(matches!(recv_stack.pop().unwrap(), Value::Int(7)));
    }

    #[test]
    fn send_respects_explicit_capacity() {
        let mut stack = vec![Value::Int(1)];
        handle_channel_new(&mut stack, 4).unwrap();
        let chan = stack.pop().unwrap();
        if let Value::Channel(c) = &chan {
            assert_eq!(c.capacity, 1);
        } else {
            panic!("expected channel");
        }
    }
}

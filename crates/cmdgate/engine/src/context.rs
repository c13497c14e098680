//! Per-invocation execution frames and the guard that stacks them.

use std::cell::RefCell;

use cmdgate_types::{ArgValue, DispatchError, ErrorKind, InvokerId};
use serde_json::json;
use uuid::Uuid;

/// Bounded scratch space that accumulates the tokens of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchBuffer {
    data: String,
    capacity: usize,
}

impl ScratchBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: String::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a token plus its terminator.
    pub fn push(&mut self, token: &str) -> Result<(), DispatchError> {
        let needed = self.data.len() + token.len() + 1;
        if needed > self.capacity {
            return Err(DispatchError::new(
                ErrorKind::BufferOverflow,
                format!(
                    "argument text needs {needed} bytes, buffer holds {}",
                    self.capacity
                ),
            )
            .with_detail(json!({ "capacity": self.capacity, "needed": needed })));
        }
        self.data.push_str(token);
        self.data.push('\0');
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens stored so far, in order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.data.split_terminator('\0')
    }
}

/// Execution frame of a single `run` call.
#[derive(Clone, Debug, PartialEq)]
pub struct Context {
    id: Uuid,
    invoker: InvokerId,
    command: String,
    text: String,
    args: Vec<ArgValue>,
    buffer: ScratchBuffer,
}

impl Context {
    pub(crate) fn new(invoker: InvokerId, buffer_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoker,
            command: String::new(),
            text: String::new(),
            args: Vec::new(),
            buffer: ScratchBuffer::new(buffer_capacity),
        }
    }

    /// Identifier used to correlate log lines of one invocation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn invoker(&self) -> InvokerId {
        self.invoker
    }

    /// Resolved command name; empty until the name has been split off.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Raw argument text following the command name.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    pub fn buffer(&self) -> &ScratchBuffer {
        &self.buffer
    }

    pub(crate) fn set_command(&mut self, command: &str, text: &str) {
        self.command = command.to_string();
        self.text = text.to_string();
    }

    pub(crate) fn set_args(&mut self, args: Vec<ArgValue>) {
        self.args = args;
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut ScratchBuffer {
        &mut self.buffer
    }
}

/// Installs a fresh context into a controller's context slot and puts the
/// previous one back when dropped, unwinding included.
pub(crate) struct Guard<'a> {
    slot: &'a RefCell<Option<Context>>,
    current: Uuid,
    previous: Option<Context>,
}

impl<'a> Guard<'a> {
    pub(crate) fn install(slot: &'a RefCell<Option<Context>>, context: Context) -> Self {
        let current = context.id();
        let previous = slot.replace(Some(context));
        Self {
            slot,
            current,
            previous,
        }
    }

    pub(crate) fn current(&self) -> Uuid {
        self.current
    }

    pub(crate) fn previous(&self) -> Option<&Context> {
        self.previous.as_ref()
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        let previous = self.previous.take();
        self.slot.replace(previous);
    }
}

use std::cell::RefCell;
use std::collections::HashSet;

use cmdgate_types::{ArgValue, ErrorKind, InvokerId, Status};

use crate::hooks::{
    AuthRequest, Authenticator, Executor, Failure, FailureHandler, HookResult, Invocation,
};

/// One call seen by a [`RecordingExecutor`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub invoker: InvokerId,
    pub command: String,
    pub args: Vec<ArgValue>,
}

/// Mock executor for testing.
///
/// Records every call and answers with a fixed status.
pub struct RecordingExecutor {
    status: Status,
    calls: RefCell<Vec<RecordedCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::returning(Status::Done)
    }

    pub fn returning(status: Status) -> Self {
        Self {
            status,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, call: &Invocation<'_>) -> HookResult {
        self.calls.borrow_mut().push(RecordedCall {
            invoker: call.invoker,
            command: call.command.to_string(),
            args: call.args.values().into_iter().cloned().collect(),
        });
        Ok(self.status)
    }
}

/// Mock authenticator for testing.
///
/// Lets through exactly the invokers that were granted access.
#[derive(Default)]
pub struct AllowList {
    allowed: RefCell<HashSet<InvokerId>>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, invoker: InvokerId) {
        self.allowed.borrow_mut().insert(invoker);
    }

    pub fn revoke(&self, invoker: InvokerId) {
        self.allowed.borrow_mut().remove(&invoker);
    }
}

impl Authenticator for AllowList {
    fn authenticate(&self, request: &AuthRequest<'_>) -> HookResult<bool> {
        Ok(self.allowed.borrow().contains(&request.invoker))
    }
}

/// Mock failure handler for testing.
///
/// Keeps `(kind, message)` of every reported failure.
#[derive(Default)]
pub struct FailureLog {
    entries: RefCell<Vec<(ErrorKind, String)>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.entries.borrow().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn entries(&self) -> Vec<(ErrorKind, String)> {
        self.entries.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl FailureHandler for FailureLog {
    fn on_failure(&self, failure: &Failure<'_>) -> HookResult<()> {
        self.entries
            .borrow_mut()
            .push((failure.error.kind, failure.error.message.clone()));
        Ok(())
    }
}

//! Lifecycle hooks: the invocable capabilities a listener or controller
//! is given by the embedding environment.
//!
//! Every hook is a trait object so the dispatcher never depends on a
//! particular scripting runtime. Closures implement the traits directly.
//! Hook faults are ordinary `anyhow` errors; a panic inside a hook is caught
//! and treated the same way.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use cmdgate_types::{Arguments, DispatchError, InvokerId, ListenerId, Status};
use thiserror::Error;

use crate::controller::Controller;

/// What a hook returns; `Err` is a fault.
pub type HookResult<T = Status> = anyhow::Result<T>;

/// Arguments shared by the audit, execute and post hooks.
///
/// `controller` is the dispatching controller; hooks may call
/// [`Controller::run`] on it to dispatch nested commands.
pub struct Invocation<'a> {
    pub controller: &'a Controller,
    pub listener: ListenerId,
    pub invoker: InvokerId,
    pub command: &'a str,
    pub args: &'a Arguments,
}

/// Arguments of an authenticate hook.
#[derive(Clone, Copy, Debug)]
pub struct AuthRequest<'a> {
    pub listener: ListenerId,
    pub invoker: InvokerId,
    pub command: &'a str,
    pub authority: i32,
}

/// Arguments of a fail hook: kind, message and detail travel in `error`.
pub struct Failure<'a> {
    pub controller: &'a Controller,
    pub invoker: InvokerId,
    pub command: &'a str,
    pub error: &'a DispatchError,
}

pub trait Executor {
    fn execute(&self, call: &Invocation<'_>) -> HookResult;
}

/// Returns `true` to let the invoker through.
pub trait Authenticator {
    fn authenticate(&self, request: &AuthRequest<'_>) -> HookResult<bool>;
}

/// Runs before execute; a negative status stops the dispatch.
pub trait Auditor {
    fn audit(&self, call: &Invocation<'_>) -> HookResult;
}

/// Runs after a successful execute with the status it returned.
pub trait PostProcessor {
    fn post(&self, call: &Invocation<'_>, status: Status) -> HookResult<()>;
}

pub trait FailureHandler {
    fn on_failure(&self, failure: &Failure<'_>) -> HookResult<()>;
}

impl<F> Executor for F
where
    F: Fn(&Invocation<'_>) -> HookResult,
{
    fn execute(&self, call: &Invocation<'_>) -> HookResult {
        self(call)
    }
}

impl<F> Authenticator for F
where
    F: Fn(&AuthRequest<'_>) -> HookResult<bool>,
{
    fn authenticate(&self, request: &AuthRequest<'_>) -> HookResult<bool> {
        self(request)
    }
}

impl<F> Auditor for F
where
    F: Fn(&Invocation<'_>) -> HookResult,
{
    fn audit(&self, call: &Invocation<'_>) -> HookResult {
        self(call)
    }
}

impl<F> PostProcessor for F
where
    F: Fn(&Invocation<'_>, Status) -> HookResult<()>,
{
    fn post(&self, call: &Invocation<'_>, status: Status) -> HookResult<()> {
        self(call, status)
    }
}

impl<F> FailureHandler for F
where
    F: Fn(&Failure<'_>) -> HookResult<()>,
{
    fn on_failure(&self, failure: &Failure<'_>) -> HookResult<()> {
        self(failure)
    }
}

/// The hook set of one listener.
#[derive(Clone, Default)]
pub struct Hooks {
    pub execute: Option<Rc<dyn Executor>>,
    pub authenticate: Option<Rc<dyn Authenticator>>,
    pub audit: Option<Rc<dyn Auditor>>,
    pub post: Option<Rc<dyn PostProcessor>>,
    pub fail: Option<Rc<dyn FailureHandler>>,
}

impl Hooks {
    /// Drop every hook.
    pub fn clear(&mut self) {
        *self = Hooks::default();
    }

    pub fn is_empty(&self) -> bool {
        self.execute.is_none()
            && self.authenticate.is_none()
            && self.audit.is_none()
            && self.post.is_none()
            && self.fail.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("execute", &self.execute.is_some())
            .field("authenticate", &self.authenticate.is_some())
            .field("audit", &self.audit.is_some())
            .field("post", &self.post.is_some())
            .field("fail", &self.fail.is_some())
            .finish()
    }
}

/// A hook that did not return normally.
#[derive(Error, Debug)]
pub enum HookFault {
    #[error("{0:#}")]
    Error(#[from] anyhow::Error),

    #[error("hook panicked: {0}")]
    Panicked(String),
}

/// Run a hook, turning errors and panics into a [`HookFault`].
pub(crate) fn guarded<T>(hook: impl FnOnce() -> HookResult<T>) -> Result<T, HookFault> {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(HookFault::Error(error)),
        Err(payload) => Err(HookFault::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_passes_values_through() {
        let value = guarded(|| Ok(7)).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn guarded_wraps_errors() {
        let fault = guarded::<()>(|| Err(anyhow::anyhow!("nope"))).unwrap_err();
        assert!(matches!(fault, HookFault::Error(_)));
        assert_eq!(fault.to_string(), "nope");
    }

    #[test]
    fn guarded_catches_panics() {
        let fault = guarded::<()>(|| panic!("exploded")).unwrap_err();
        match fault {
            HookFault::Panicked(message) => assert_eq!(message, "exploded"),
            other => panic!("unexpected fault: {other:?}"),
        }
    }

    #[test]
    fn cleared_hooks_are_empty() {
        let mut hooks = Hooks::default();
        let auth: Rc<dyn Authenticator> = Rc::new(|_: &AuthRequest<'_>| -> HookResult<bool> { Ok(true) });
        hooks.authenticate = Some(auth);
        assert!(!hooks.is_empty());
        hooks.clear();
        assert!(hooks.is_empty());
    }
}

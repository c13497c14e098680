use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::ListenerId;
use crate::value::Status;

/// Result of one dispatch: the status returned by the execute hook, or the
/// kind of failure that stopped the pipeline.
pub type RunResult = Result<Status, ErrorKind>;

/// Result type for registration and configuration operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// When in the pipeline a failure kind can occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Raised before any hook ran; no side effects.
    PreCallback,
    /// Raised by the suspension, authority or executor gates.
    Authorization,
    /// Raised by or after the audit, execute or post hooks.
    Execution,
    /// The failure channel itself faulted.
    Meta,
}

/// Dispatch failure kinds. Codes are stable and start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyCommand,
    InvalidCommand,
    SyntaxError,
    UnknownCommand,
    MissingExecuter,
    InsufficientAuth,
    IncompleteArgs,
    ExtraneousArgs,
    UnsupportedArg,
    BufferOverflow,
    ExecutionFailed,
    ExecutionAborted,
    PostProcessingFailed,
    UnresolvedFailure,
    CommandSuspended,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::EmptyCommand,
        ErrorKind::InvalidCommand,
        ErrorKind::SyntaxError,
        ErrorKind::UnknownCommand,
        ErrorKind::MissingExecuter,
        ErrorKind::InsufficientAuth,
        ErrorKind::IncompleteArgs,
        ErrorKind::ExtraneousArgs,
        ErrorKind::UnsupportedArg,
        ErrorKind::BufferOverflow,
        ErrorKind::ExecutionFailed,
        ErrorKind::ExecutionAborted,
        ErrorKind::PostProcessingFailed,
        ErrorKind::UnresolvedFailure,
        ErrorKind::CommandSuspended,
    ];

    /// Numeric result code.
    pub fn code(self) -> u8 {
        match self {
            ErrorKind::EmptyCommand => 1,
            ErrorKind::InvalidCommand => 2,
            ErrorKind::SyntaxError => 3,
            ErrorKind::UnknownCommand => 4,
            ErrorKind::MissingExecuter => 5,
            ErrorKind::InsufficientAuth => 6,
            ErrorKind::IncompleteArgs => 7,
            ErrorKind::ExtraneousArgs => 8,
            ErrorKind::UnsupportedArg => 9,
            ErrorKind::BufferOverflow => 10,
            ErrorKind::ExecutionFailed => 11,
            ErrorKind::ExecutionAborted => 12,
            ErrorKind::PostProcessingFailed => 13,
            ErrorKind::UnresolvedFailure => 14,
            ErrorKind::CommandSuspended => 15,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn phase(self) -> Phase {
        match self {
            ErrorKind::EmptyCommand
            | ErrorKind::InvalidCommand
            | ErrorKind::UnknownCommand
            | ErrorKind::SyntaxError
            | ErrorKind::IncompleteArgs
            | ErrorKind::ExtraneousArgs
            | ErrorKind::UnsupportedArg
            | ErrorKind::BufferOverflow => Phase::PreCallback,
            ErrorKind::CommandSuspended
            | ErrorKind::InsufficientAuth
            | ErrorKind::MissingExecuter => Phase::Authorization,
            ErrorKind::ExecutionFailed
            | ErrorKind::ExecutionAborted
            | ErrorKind::PostProcessingFailed => Phase::Execution,
            ErrorKind::UnresolvedFailure => Phase::Meta,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ErrorKind::EmptyCommand => "empty command",
            ErrorKind::InvalidCommand => "invalid command",
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::UnknownCommand => "unknown command",
            ErrorKind::MissingExecuter => "missing executer",
            ErrorKind::InsufficientAuth => "insufficient authority",
            ErrorKind::IncompleteArgs => "incomplete arguments",
            ErrorKind::ExtraneousArgs => "extraneous arguments",
            ErrorKind::UnsupportedArg => "unsupported argument",
            ErrorKind::BufferOverflow => "buffer overflow",
            ErrorKind::ExecutionFailed => "execution failed",
            ErrorKind::ExecutionAborted => "execution aborted",
            ErrorKind::PostProcessingFailed => "post-processing failed",
            ErrorKind::UnresolvedFailure => "unresolved failure",
            ErrorKind::CommandSuspended => "command suspended",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A dispatch failure as reported to fail hooks.
///
/// `detail` carries stage specific context, e.g. the offending argument
/// index or the required authority level.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Value,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Registration and configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid command name: {0:?}")]
    InvalidName(String),

    #[error("command already exists: {0}")]
    DuplicateCommand(String),

    #[error("unknown type specifier {ch:?} at position {position}")]
    InvalidSpec { ch: char, position: usize },

    #[error("greedy specifier must be the last one, found at position {0}")]
    GreedyNotLast(usize),

    #[error("argument specification declares {declared} slots, limit is {limit}")]
    SpecTooLong { declared: usize, limit: usize },

    #[error("argument index {index} out of range (limit {limit})")]
    ArgIndexOutOfRange { index: usize, limit: usize },

    #[error("minimum argument count {min} exceeds maximum {max}")]
    MinAboveMax { min: usize, max: usize },

    #[error("maximum argument count {max} below minimum {min}")]
    MaxBelowMin { min: usize, max: usize },

    #[error("stale or unknown listener handle: {0}")]
    StaleListener(ListenerId),

    #[error("configuration error: {0}")]
    Config(String),
}

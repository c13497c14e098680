//! cmdgate — command registration, argument parsing and dispatch.
//!
//! Listeners describe commands: an argument spec, count bounds, an authority
//! level and a set of lifecycle hooks. A [`Controller`] binds listener names
//! and runs each input line through a fixed pipeline:
//!
//! 1. **Resolve** — trim, split off the name, look it up
//! 2. **Gate** — suspension, authority, executor presence
//! 3. **Parse** — tokenize and coerce against the spec, check counts
//! 4. **Execute** — audit, execute and post hooks
//!
//! Failures are reported through the fail hook and returned as an
//! [`ErrorKind`]. Dispatch is single-threaded and re-entrant: hooks may run
//! nested commands on the same controller.
//!
//! ```no_run
//! use cmdgate::{Listener, Manager, Status};
//!
//! let manager = Manager::standalone()?;
//! manager.create(
//!     Listener::builder("kick")
//!         .spec("is")
//!         .tags(["id", "reason"])
//!         .min_args(1)
//!         .max_args(2)
//!         .on_execute(|call| {
//!             println!("kicking {:?}", call.args.get(0));
//!             Ok(Status::Done)
//!         }),
//! )?;
//! assert_eq!(manager.run(1u64, "kick 5 spamming"), Ok(Status::Done));
//! # Ok::<(), cmdgate::EngineError>(())
//! ```

pub mod command;
pub mod context;
pub mod controller;
pub mod hooks;
pub mod listener;
pub mod manager;
pub mod mocks;
pub mod registry;
pub mod spec;
pub mod tokenizer;

pub use cmdgate_types::{
    ArgFlags, ArgType, ArgValue, Arguments, ControllerId, DispatchError, EngineConfig,
    EngineError, EngineResult, ErrorKind, InvokerId, ListenerId, Phase, RunResult, Status,
};
pub use command::{name_hash, Command, CommandTable};
pub use context::{Context, ScratchBuffer};
pub use controller::Controller;
pub use hooks::{
    AuthRequest, Auditor, Authenticator, Executor, Failure, FailureHandler, HookFault,
    HookResult, Hooks, Invocation, PostProcessor,
};
pub use listener::{CommandInfo, Listener, ListenerBuilder};
pub use manager::Manager;
pub use mocks::{AllowList, FailureLog, RecordedCall, RecordingExecutor};
pub use registry::ListenerRegistry;
pub use spec::ArgSpec;
pub use tokenizer::parse_arguments;

//! Shared vocabulary of the cmdgate command dispatch engine.
//!
//! Everything here is plain data: argument flags and values, the non-owning
//! identifiers that tie listeners to controllers, the engine configuration
//! and the two error families.
//!
//! - [`ErrorKind`] is the result code handed back by a dispatch. Its
//!   [`Phase`] tells whether anything observable happened before the failure.
//! - [`EngineError`] covers registration and configuration mistakes, which
//!   are always reported eagerly and never deferred to dispatch time.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod flags;
pub mod ids;
pub mod value;

pub use config::EngineConfig;
pub use error::{DispatchError, EngineError, EngineResult, ErrorKind, Phase, RunResult};
pub use flags::{ArgFlags, ArgType};
pub use ids::{ControllerId, InvokerId, ListenerId};
pub use value::{ArgValue, Arguments, Status};

//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Upper bound accepted for `max_args`.
pub const MAX_ARG_SLOTS: usize = 64;

/// Engine-wide limits shared by every controller built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of argument slots in a compiled spec. Listeners accept at most
    /// `max_args - 1` arguments.
    pub max_args: usize,
    /// Scratch buffer size, in bytes, available to a single invocation.
    pub buffer_capacity: usize,
    /// Authority level given to listeners that do not set one.
    pub default_authority: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_args: 16,
            buffer_capacity: 1024,
            default_authority: -1,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_args < 2 || self.max_args > MAX_ARG_SLOTS {
            return Err(EngineError::Config(format!(
                "max_args must be within 2..={MAX_ARG_SLOTS}, got {}",
                self.max_args
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(EngineError::Config("buffer_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Highest argument count a listener may declare.
    pub fn arg_limit(&self) -> usize {
        self.max_args - 1
    }
}

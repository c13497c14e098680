use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to a listener in a registry slot table.
///
/// The generation changes every time a slot is reused, so a handle to a
/// removed listener never resolves to its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId {
    index: u32,
    generation: u32,
}

impl ListenerId {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}v{}", self.index, self.generation)
    }
}

/// Non-owning key of a controller, unique within one registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub u64);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller#{}", self.0)
    }
}

/// Opaque handle of the entity invoking a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvokerId(pub u64);

impl fmt::Display for InvokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invoker#{}", self.0)
    }
}

impl From<u64> for InvokerId {
    fn from(id: u64) -> Self {
        InvokerId(id)
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Per-slot argument flags of a compiled argument specification.
    ///
    /// An empty set means the slot accepts any coercible value.
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ArgFlags: u8 {
        /// Signed 64-bit integer.
        const INTEGER = 1 << 0;
        /// 64-bit float.
        const FLOAT   = 1 << 1;
        /// `true`/`false`/`on`/`off`.
        const BOOLEAN = 1 << 2;
        /// Plain string.
        const STRING  = 1 << 3;
        /// Fold string values to lowercase.
        const LOWER   = 1 << 4;
        /// Fold string values to uppercase.
        const UPPER   = 1 << 5;
        /// Consume the remainder of the input verbatim.
        const GREEDY  = 1 << 6;
    }
}

impl ArgFlags {
    /// Slot that accepts any value.
    pub const ANY: ArgFlags = ArgFlags::empty();

    /// Whether this slot accepts any value.
    pub fn is_any(self) -> bool {
        self.is_empty()
    }

    /// Whether a value carrying `requested` may be stored in this slot.
    ///
    /// Greedy slots always take the remainder as a string.
    pub fn accepts(self, requested: ArgFlags) -> bool {
        if self.is_any() || self.intersects(requested) {
            return true;
        }
        self.contains(ArgFlags::GREEDY) && requested.contains(ArgFlags::STRING)
    }

    /// Human readable type label used in generated usage lines.
    pub fn describe(self) -> String {
        if self.is_any() {
            return "any".into();
        }
        if self.contains(ArgFlags::GREEDY) {
            return "text".into();
        }

        let mut parts: Vec<&str> = Vec::new();
        if self.contains(ArgFlags::INTEGER) {
            parts.push("integer");
        }
        if self.contains(ArgFlags::FLOAT) {
            parts.push("float");
        }
        if self.contains(ArgFlags::BOOLEAN) {
            parts.push("boolean");
        }
        if self.contains(ArgFlags::STRING) {
            if self.contains(ArgFlags::LOWER) {
                parts.push("lowercase");
            } else if self.contains(ArgFlags::UPPER) {
                parts.push("uppercase");
            } else {
                parts.push("string");
            }
        }
        parts.join("|")
    }
}

impl Default for ArgFlags {
    fn default() -> Self {
        ArgFlags::ANY
    }
}

impl fmt::Debug for ArgFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArgFlags({})", self.describe())
    }
}

/// Type tag of a parsed argument value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    Integer,
    Float,
    Boolean,
    String,
}

impl ArgType {
    /// The flag a slot must accept for a value of this type.
    pub fn flag(self) -> ArgFlags {
        match self {
            ArgType::Integer => ArgFlags::INTEGER,
            ArgType::Float => ArgFlags::FLOAT,
            ArgType::Boolean => ArgFlags::BOOLEAN,
            ArgType::String => ArgFlags::STRING,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArgType::Integer => "integer",
            ArgType::Float => "float",
            ArgType::Boolean => "boolean",
            ArgType::String => "string",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

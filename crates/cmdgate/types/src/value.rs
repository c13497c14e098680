use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flags::ArgType;

/// A parsed and coerced command argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl ArgValue {
    pub fn arg_type(&self) -> ArgType {
        match self {
            ArgValue::Integer(_) => ArgType::Integer,
            ArgValue::Float(_) => ArgType::Float,
            ArgValue::Boolean(_) => ArgType::Boolean,
            ArgValue::String(_) => ArgType::String,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Bare JSON value, without the type tag.
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Integer(v) => Value::from(*v),
            ArgValue::Float(v) => Value::from(*v),
            ArgValue::Boolean(v) => Value::from(*v),
            ArgValue::String(v) => Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Integer(v) => write!(f, "{v}"),
            ArgValue::Float(v) => write!(f, "{v}"),
            ArgValue::Boolean(v) => write!(f, "{v}"),
            ArgValue::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Integer(v)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Boolean(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::String(v.to_string())
    }
}

/// Arguments as delivered to lifecycle hooks.
///
/// Associative listeners receive their values keyed by argument tag, falling
/// back to the slot index when a slot has no tag.
#[derive(Clone, Debug, PartialEq)]
pub enum Arguments {
    Positional(Vec<ArgValue>),
    Associative(Vec<(String, ArgValue)>),
}

impl Arguments {
    pub fn len(&self) -> usize {
        match self {
            Arguments::Positional(v) => v.len(),
            Arguments::Associative(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_associative(&self) -> bool {
        matches!(self, Arguments::Associative(_))
    }

    /// Value at a slot index, regardless of delivery style.
    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        match self {
            Arguments::Positional(v) => v.get(index),
            Arguments::Associative(v) => v.get(index).map(|(_, value)| value),
        }
    }

    /// Value by key. Only associative arguments carry keys.
    pub fn by_key(&self, key: &str) -> Option<&ArgValue> {
        match self {
            Arguments::Positional(_) => None,
            Arguments::Associative(v) => v.iter().find(|(k, _)| k == key).map(|(_, value)| value),
        }
    }

    pub fn values(&self) -> Vec<&ArgValue> {
        match self {
            Arguments::Positional(v) => v.iter().collect(),
            Arguments::Associative(v) => v.iter().map(|(_, value)| value).collect(),
        }
    }

    /// JSON array for positional arguments, JSON object for associative ones.
    pub fn to_json(&self) -> Value {
        match self {
            Arguments::Positional(v) => Value::Array(v.iter().map(ArgValue::to_json).collect()),
            Arguments::Associative(v) => Value::Object(
                v.iter()
                    .map(|(k, value)| (k.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Status returned by execute, audit and post hooks.
///
/// A negative code signals a logical failure by convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Done,
    Code(i64),
}

impl Status {
    pub fn is_rejection(self) -> bool {
        matches!(self, Status::Code(c) if c < 0)
    }

    pub fn code(self) -> Option<i64> {
        match self {
            Status::Done => None,
            Status::Code(c) => Some(c),
        }
    }
}

impl From<i64> for Status {
    fn from(code: i64) -> Self {
        Status::Code(code)
    }
}

impl From<()> for Status {
    fn from(_: ()) -> Self {
        Status::Done
    }
}

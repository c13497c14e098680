//! Argument specification compiler.
//!
//! A spec string declares one character per argument position:
//!
//! | char | slot |
//! |------|------|
//! | `i`  | integer |
//! | `f`  | float |
//! | `b`  | boolean |
//! | `s`  | string |
//! | `l`  | string folded to lowercase |
//! | `u`  | string folded to uppercase |
//! | `*`  | any value |
//! | `g`  | remainder of the line, verbatim (last position only) |
//!
//! Whitespace is ignored. Positions past the declared ones accept any value.

use std::fmt;

use cmdgate_types::{ArgFlags, EngineError, EngineResult};

/// Compiled per-slot flags. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ArgSpec {
    slots: Box<[ArgFlags]>,
    declared: usize,
    source: String,
}

impl ArgSpec {
    /// A spec where every one of `slot_count` slots accepts any value.
    pub fn any(slot_count: usize) -> Self {
        Self {
            slots: vec![ArgFlags::ANY; slot_count].into_boxed_slice(),
            declared: 0,
            source: String::new(),
        }
    }

    /// Compile `source` into `slot_count` slots.
    ///
    /// At most `slot_count - 1` positions may be declared.
    pub fn compile(source: &str, slot_count: usize) -> EngineResult<Self> {
        let limit = slot_count.saturating_sub(1);
        let chars: Vec<(usize, char)> = source
            .chars()
            .enumerate()
            .filter(|(_, ch)| !ch.is_whitespace())
            .collect();

        if chars.len() > limit {
            return Err(EngineError::SpecTooLong {
                declared: chars.len(),
                limit,
            });
        }

        let mut spec = Self::any(slot_count);
        for (slot, (position, ch)) in chars.iter().copied().enumerate() {
            spec.slots[slot] = match ch {
                'i' => ArgFlags::INTEGER,
                'f' => ArgFlags::FLOAT,
                'b' => ArgFlags::BOOLEAN,
                's' => ArgFlags::STRING,
                'l' => ArgFlags::STRING | ArgFlags::LOWER,
                'u' => ArgFlags::STRING | ArgFlags::UPPER,
                '*' => ArgFlags::ANY,
                'g' if slot + 1 == chars.len() => ArgFlags::GREEDY,
                'g' => return Err(EngineError::GreedyNotLast(position)),
                other => {
                    return Err(EngineError::InvalidSpec {
                        ch: other,
                        position,
                    })
                }
            };
        }
        spec.declared = chars.len();
        spec.source = source.to_string();
        Ok(spec)
    }

    /// Flags of a slot; out of range slots accept any value.
    pub fn slot(&self, index: usize) -> ArgFlags {
        self.slots.get(index).copied().unwrap_or(ArgFlags::ANY)
    }

    /// Whether slot `index` accepts a value carrying `requested`.
    pub fn check(&self, index: usize, requested: ArgFlags) -> bool {
        self.slot(index).accepts(requested)
    }

    /// Number of explicitly declared positions.
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Total number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn greedy_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|flags| flags.contains(ArgFlags::GREEDY))
    }
}

impl fmt::Debug for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgSpec")
            .field("source", &self.source)
            .field("slots", &&self.slots[..self.declared])
            .finish()
    }
}

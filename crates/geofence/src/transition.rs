//! Geofence Transition Flags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Set of transitions that trigger a geofence, stored as bit flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionType(i32);

impl TransitionType {
    /// Device entered the fence
    pub const ENTER: Self = Self(1);
    /// Device left the fence
    pub const EXIT: Self = Self(2);
    /// Device lingered inside the fence
    pub const DWELL: Self = Self(4);

    const ALL_BITS: i32 = 1 | 2 | 4;

    /// Wrap raw flags as read back from storage
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw flag value
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Non-empty and free of unknown bits
    pub const fn is_valid(self) -> bool {
        self.0 != 0 && self.0 & !Self::ALL_BITS == 0
    }
}

impl Default for TransitionType {
    fn default() -> Self {
        Self::ENTER
    }
}

impl BitOr for TransitionType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [(Self::ENTER, "ENTER"), (Self::EXIT, "EXIT"), (Self::DWELL, "DWELL")]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();

        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic per-record counter, incremented on every local write.
///
/// The sync pass captures the version at upload initiation and the store
/// compares it when clearing the dirty flag, so an upload of a stale
/// version never clears a newer local edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordVersion(i64);

impl RecordVersion {
    pub fn initial() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordVersion {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

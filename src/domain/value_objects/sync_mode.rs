use serde::{Deserialize, Serialize};
use std::fmt;

/// Connectivity mode derived from two independent signals: network
/// reachability and remote account availability. Offline wins whenever
/// either signal is known bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl SyncMode {
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncMode::Offline)
    }

    pub fn is_online(&self) -> bool {
        matches!(self, SyncMode::Online)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncMode::Unknown => "unknown",
            SyncMode::Online => "online",
            SyncMode::Offline => "offline",
        };
        f.write_str(label)
    }
}

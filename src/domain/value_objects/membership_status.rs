use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle of a membership. Removal is a soft delete: the row survives
/// with status `Removed` so the removal itself can propagate remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Pending,
    Removed,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Pending => "pending",
            MembershipStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "pending" => Ok(MembershipStatus::Pending),
            "removed" => Ok(MembershipStatus::Removed),
            other => Err(format!("Unknown membership status: {other}")),
        }
    }
}

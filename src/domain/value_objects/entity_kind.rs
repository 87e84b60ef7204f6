use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The compile-time list of syncable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Family,
    Membership,
    Profile,
}

impl EntityKind {
    /// Fixed upload order for a sync pass: parents before the records that
    /// reference them, so the remote store never sees a membership whose
    /// family was not at least attempted first.
    pub const UPLOAD_ORDER: [EntityKind; 3] =
        [EntityKind::Family, EntityKind::Membership, EntityKind::Profile];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Family => "family",
            EntityKind::Membership => "membership",
            EntityKind::Profile => "profile",
        }
    }

    /// Remote record type name for this kind.
    pub fn record_type(&self) -> &'static str {
        match self {
            EntityKind::Family => "Family",
            EntityKind::Membership => "Membership",
            EntityKind::Profile => "Profile",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "family" | "Family" => Ok(EntityKind::Family),
            "membership" | "Membership" => Ok(EntityKind::Membership),
            "profile" | "Profile" => Ok(EntityKind::Profile),
            other => Err(format!("Unknown entity kind: {other}")),
        }
    }
}

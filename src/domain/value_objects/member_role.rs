use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Role of a member within a family.
///
/// `ParentAdmin` is the primary role: at most one active holder may exist
/// per family at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    ParentAdmin,
    Parent,
    Child,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::ParentAdmin => "parent_admin",
            MemberRole::Parent => "parent",
            MemberRole::Child => "child",
        }
    }

    /// True for roles limited to a single active holder per family.
    pub fn is_primary(&self) -> bool {
        matches!(self, MemberRole::ParentAdmin)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent_admin" => Ok(MemberRole::ParentAdmin),
            "parent" => Ok(MemberRole::Parent),
            "child" => Ok(MemberRole::Child),
            other => Err(format!("Unknown member role: {other}")),
        }
    }
}

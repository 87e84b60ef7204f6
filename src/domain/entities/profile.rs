use crate::domain::entities::SyncMeta;
use crate::domain::value_objects::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user profile. `external_id_hash` is the hashed identity-provider id;
/// the engine treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub display_name: String,
    pub external_id_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMeta,
}

impl UserProfile {
    pub fn new(display_name: String, external_id_hash: String, avatar_url: Option<String>) -> Self {
        Self {
            id: ProfileId::generate(),
            display_name,
            external_id_hash,
            avatar_url,
            created_at: Utc::now(),
            sync: SyncMeta::dirty(),
        }
    }
}

use crate::domain::value_objects::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Reference to another record inside the zone. Cascade is enforced
/// locally, never server-side, so references carry no delete action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReference {
    pub record_id: Uuid,
    pub zone: Option<String>,
}

impl RecordReference {
    pub fn new(record_id: Uuid, zone: Option<String>) -> Self {
        Self { record_id, zone }
    }
}

/// The remote store's record representation: a named type, a zone
/// assignment, and a flat field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub record_id: Uuid,
    pub kind: EntityKind,
    pub zone: Option<String>,
    pub fields: Map<String, Value>,
    /// Server-assigned modification time; the remote side of conflict
    /// comparisons.
    pub modified_at: DateTime<Utc>,
}

impl RemoteRecord {
    pub fn new(kind: EntityKind, record_id: Uuid, zone: Option<String>) -> Self {
        Self {
            record_id,
            kind,
            zone,
            fields: Map::new(),
            modified_at: Utc::now(),
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn set_reference(&mut self, name: &str, reference: RecordReference) {
        let value = serde_json::to_value(&reference).unwrap_or(Value::Null);
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    pub fn get_reference(&self, name: &str) -> Option<RecordReference> {
        self.fields
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

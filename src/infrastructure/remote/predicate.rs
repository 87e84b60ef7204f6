use crate::domain::value_objects::EntityKind;
use crate::shared::error::RemoteError;
use serde_json::Value;

use super::record::RemoteRecord;

/// Fields the remote store accepts in query filters, per record type.
fn allowed_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Family => &["name", "code", "createdByUserId"],
        EntityKind::Membership => &["role", "status", "groupRef", "userRef"],
        EntityKind::Profile => &["displayName", "externalIdHash"],
    }
}

/// A typed query filter, validated before it is ever sent. Clauses are
/// combined with AND; only equality is supported, which is all the code
/// lookup and membership queries need.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    clauses: Vec<(String, Value)>,
}

impl Predicate {
    /// Matches every record of the queried type.
    pub fn all() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self {
            clauses: vec![(field.to_string(), value.into())],
        }
    }

    pub fn and_equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    /// Rejects unsupported shapes before the query leaves the process:
    /// unknown field names, non-scalar values, and strings carrying quote
    /// or control characters that could corrupt a server-side filter.
    pub fn validate(&self, kind: EntityKind) -> Result<(), RemoteError> {
        let allowed = allowed_fields(kind);
        for (field, value) in &self.clauses {
            if !allowed.contains(&field.as_str()) {
                return Err(RemoteError::InvalidArguments(format!(
                    "Field {field} is not queryable on {kind}"
                )));
            }
            match value {
                Value::String(s) => {
                    if s.chars().any(|c| c.is_control() || c == '"' || c == '\'') {
                        return Err(RemoteError::InvalidArguments(format!(
                            "Unsafe characters in filter value for {field}"
                        )));
                    }
                }
                Value::Bool(_) | Value::Number(_) => {}
                _ => {
                    return Err(RemoteError::InvalidArguments(format!(
                        "Filter value for {field} must be a scalar"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Evaluates the predicate against a record. Used by in-process
    /// transports; a real backend evaluates server-side.
    pub fn matches(&self, record: &RemoteRecord) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_known_field() {
        let p = Predicate::equals("code", "AB12CD");
        assert!(p.validate(EntityKind::Family).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let p = Predicate::equals("password", "x");
        let err = p.validate(EntityKind::Family).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidArguments(_)));
    }

    #[test]
    fn test_validate_rejects_unsafe_string() {
        let p = Predicate::equals("name", "Lopez\" OR 1=1");
        assert!(p.validate(EntityKind::Family).is_err());
    }

    #[test]
    fn test_validate_rejects_non_scalar_value() {
        let p = Predicate::equals("name", serde_json::json!(["a", "b"]));
        assert!(p.validate(EntityKind::Family).is_err());
    }

    #[test]
    fn test_matches_all_clauses() {
        let mut record = RemoteRecord::new(EntityKind::Family, uuid::Uuid::new_v4(), None);
        record.set("name", "Lopez".into());
        record.set("code", "AB12CD".into());

        assert!(Predicate::equals("name", "Lopez").matches(&record));
        assert!(Predicate::equals("name", "Lopez")
            .and_equals("code", "AB12CD")
            .matches(&record));
        assert!(!Predicate::equals("name", "Nguyen").matches(&record));
        assert!(Predicate::all().matches(&record));
    }
}

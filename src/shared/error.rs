use thiserror::Error;

/// Errors raised by the local store adapter.
///
/// `ValidationFailed` and `ConstraintViolation` are distinct so callers can
/// render different messages: the former is a field-format problem, the
/// latter a uniqueness/role conflict with existing records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::ConstraintViolation(db_err.to_string());
            }
        }
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors raised by the remote record store.
///
/// The split between retryable and permanent variants drives the retry
/// policy in the sync client; see [`RemoteError::is_retryable`].
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("Network unavailable: {0}")]
    Network(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Zone busy")]
    ZoneBusy,

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Transient server error: {0}")]
    ServerError(String),

    #[error("Quota exceeded")]
    QuotaExceeded,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Schema incompatible: {0}")]
    SchemaIncompatible(String),

    #[error("Server record changed: {0}")]
    ServerRecordChanged(String),

    #[error("Retry limit exceeded after {attempts} attempts: {last}")]
    RetryLimitExceeded { attempts: u32, last: Box<RemoteError> },

    #[error("Internal remote error: {0}")]
    Internal(String),
}

impl RemoteError {
    /// Transient failures worth another attempt after a backoff delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_)
                | RemoteError::ServiceUnavailable(_)
                | RemoteError::RateLimited
                | RemoteError::ZoneBusy
                | RemoteError::ServerError(_)
        )
    }

    /// True when the failure is connectivity-shaped, including a retry
    /// exhaustion whose underlying cause was connectivity-shaped. These are
    /// not surfaced to the user; the next pass simply retries.
    pub fn is_network_related(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::ServiceUnavailable(_) => true,
            RemoteError::RetryLimitExceeded { last, .. } => last.is_network_related(),
            _ => false,
        }
    }
}

/// Orchestrator-facing union of the two layers.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

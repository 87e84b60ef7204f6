use crate::domain::value_objects::EntityKind;
use crate::infrastructure::remote::{Predicate, RemoteRecord};
use crate::shared::error::RemoteResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Availability of the remote account, used by the orchestrator to decide
/// the offline/online mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Available,
    Unavailable,
    Restricted,
    #[default]
    Unknown,
}

impl AccountStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, AccountStatus::Available)
    }
}

/// Raw verbs of the remote record store. One remote call per method, no
/// retry and no zone fallback here; [`RemoteSyncClient`] layers the policy
/// on top.
///
/// [`RemoteSyncClient`]: crate::infrastructure::remote::RemoteSyncClient
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Create-or-update keyed by record id: the same id always lands in the
    /// same remote slot. Returns the stored record with its server-assigned
    /// modification time.
    async fn save_record(&self, record: RemoteRecord) -> RemoteResult<RemoteRecord>;

    /// Batch variant. Per-record failures are reported in the result list
    /// and do not abort the rest of the batch; the outer error is reserved
    /// for whole-batch failures (network, zone missing).
    async fn save_records(
        &self,
        records: Vec<RemoteRecord>,
    ) -> RemoteResult<Vec<(Uuid, RemoteResult<RemoteRecord>)>>;

    async fn fetch_record(
        &self,
        kind: EntityKind,
        id: Uuid,
        zone: Option<&str>,
    ) -> RemoteResult<Option<RemoteRecord>>;

    async fn query_records(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        zone: Option<&str>,
    ) -> RemoteResult<Vec<RemoteRecord>>;

    async fn delete_record(&self, kind: EntityKind, id: Uuid, zone: Option<&str>)
        -> RemoteResult<()>;

    async fn create_zone(&self, name: &str) -> RemoteResult<()>;
    async fn zone_exists(&self, name: &str) -> RemoteResult<bool>;

    /// Identifiers of the change-notification subscriptions currently
    /// registered for this client.
    async fn subscription_ids(&self) -> RemoteResult<Vec<String>>;

    async fn create_subscription(
        &self,
        id: &str,
        kind: EntityKind,
        zone: &str,
    ) -> RemoteResult<()>;

    async fn account_status(&self) -> AccountStatus;
}

use crate::application::ports::remote_transport::{AccountStatus, RemoteTransport};
use crate::domain::entities::SyncEntity;
use crate::domain::value_objects::{EntityKind, SyncMode};
use crate::shared::config::SyncConfig;
use crate::shared::error::{RemoteError, RemoteResult};
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::codec::RecordCodec;
use super::predicate::Predicate;
use super::record::RemoteRecord;

/// Remote-store client: codec + zone management + retry policy.
///
/// Every remote call runs inside a retry loop of `max_attempts` tries with
/// exponential backoff (`base_delay * 2^(attempt-1)`) plus 0-10% jitter.
/// Errors are classified via [`RemoteError::is_retryable`]; permanent
/// failures abort immediately, and exhausting the budget surfaces a
/// distinct `RetryLimitExceeded` so callers can tell "gave up" from
/// "definitely broken". When connectivity is already known down, calls
/// fail fast without a network round trip.
pub struct RemoteSyncClient<T: RemoteTransport> {
    transport: Arc<T>,
    codec: RecordCodec,
    config: SyncConfig,
    mode: Option<watch::Receiver<SyncMode>>,
    /// Set when a zone-scoped call fell back to the default zone because
    /// the zone disappeared server-side; `ensure_zone` re-creates it.
    zone_missing: AtomicBool,
}

impl<T: RemoteTransport> RemoteSyncClient<T> {
    pub fn new(transport: Arc<T>, config: SyncConfig) -> Self {
        let codec = RecordCodec::new(config.zone_name.clone());
        Self {
            transport,
            codec,
            config,
            mode: None,
            zone_missing: AtomicBool::new(false),
        }
    }

    /// Wires in the connectivity mode so calls can fail fast while offline.
    pub fn with_connectivity(mut self, mode: watch::Receiver<SyncMode>) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Create-or-update in the configured zone. Idempotent under retry:
    /// the record id addresses the same remote slot on every attempt.
    pub async fn upsert(&self, entity: &SyncEntity) -> RemoteResult<RemoteRecord> {
        let record = self.codec.encode(entity);
        self.with_retry("upsert", || {
            let transport = Arc::clone(&self.transport);
            let record = record.clone();
            async move { transport.save_record(record).await }
        })
        .await
    }

    /// Batch upsert. A per-record failure inside a batch does not abort the
    /// rest; the caller re-derives the dirty set and retries only the
    /// failures on a later pass.
    pub async fn batch_upsert(
        &self,
        entities: &[SyncEntity],
    ) -> RemoteResult<Vec<(Uuid, RemoteResult<RemoteRecord>)>> {
        let records: Vec<RemoteRecord> = entities.iter().map(|e| self.codec.encode(e)).collect();
        let mut results = Vec::with_capacity(records.len());
        for chunk in records.chunks(self.config.batch_size.max(1) as usize) {
            let chunk_results = self
                .with_retry("batch_upsert", || {
                    let transport = Arc::clone(&self.transport);
                    let records = chunk.to_vec();
                    async move { transport.save_records(records).await }
                })
                .await?;
            results.extend(chunk_results);
        }
        Ok(results)
    }

    /// Not-found is a normal `None`, never an error.
    pub async fn fetch_by_id(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> RemoteResult<Option<RemoteRecord>> {
        let zone = self.codec.zone().to_string();
        let zoned = self
            .with_retry("fetch_by_id", || {
                let transport = Arc::clone(&self.transport);
                let zone = zone.clone();
                async move { transport.fetch_record(kind, id, Some(&zone)).await }
            })
            .await;

        match zoned {
            Err(RemoteError::ZoneNotFound(_)) => self.default_zone_fallback(|| {
                let transport = Arc::clone(&self.transport);
                async move { transport.fetch_record(kind, id, None).await }
            })
            .await,
            other => other,
        }
    }

    /// Validate-then-send: the predicate is checked locally before any
    /// network traffic.
    pub async fn fetch_by_predicate(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        predicate.validate(kind)?;

        let zone = self.codec.zone().to_string();
        let zoned = self
            .with_retry("fetch_by_predicate", || {
                let transport = Arc::clone(&self.transport);
                let predicate = predicate.clone();
                let zone = zone.clone();
                async move { transport.query_records(kind, &predicate, Some(&zone)).await }
            })
            .await;

        match zoned {
            Err(RemoteError::ZoneNotFound(_)) => self.default_zone_fallback(|| {
                let transport = Arc::clone(&self.transport);
                let predicate = predicate.clone();
                async move { transport.query_records(kind, &predicate, None).await }
            })
            .await,
            other => other,
        }
    }

    pub async fn delete(&self, kind: EntityKind, id: Uuid) -> RemoteResult<()> {
        let zone = self.codec.zone().to_string();
        self.with_retry("delete", || {
            let transport = Arc::clone(&self.transport);
            let zone = zone.clone();
            async move { transport.delete_record(kind, id, Some(&zone)).await }
        })
        .await
    }

    /// Creates the zone if it does not exist (or vanished server-side).
    /// Zone creation is a precondition, not a per-record step; safe to call
    /// on every start.
    pub async fn ensure_zone(&self) -> RemoteResult<()> {
        let zone = self.codec.zone().to_string();
        let exists = self
            .with_retry("zone_exists", || {
                let transport = Arc::clone(&self.transport);
                let zone = zone.clone();
                async move { transport.zone_exists(&zone).await }
            })
            .await?;

        if exists && !self.zone_missing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.with_retry("create_zone", || {
            let transport = Arc::clone(&self.transport);
            let zone = zone.clone();
            async move { transport.create_zone(&zone).await }
        })
        .await?;
        info!(zone = %self.codec.zone(), "Created remote zone");
        Ok(())
    }

    /// Registers one change-notification subscription per entity type,
    /// check-then-create with stable identifiers so re-registration is a
    /// no-op.
    pub async fn ensure_subscriptions(&self) -> RemoteResult<()> {
        let existing = self
            .with_retry("subscription_ids", || {
                let transport = Arc::clone(&self.transport);
                async move { transport.subscription_ids().await }
            })
            .await?;

        for kind in EntityKind::UPLOAD_ORDER {
            let id = Self::subscription_id(kind);
            if existing.iter().any(|s| s == &id) {
                continue;
            }
            let zone = self.codec.zone().to_string();
            self.with_retry("create_subscription", || {
                let transport = Arc::clone(&self.transport);
                let id = id.clone();
                let zone = zone.clone();
                async move { transport.create_subscription(&id, kind, &zone).await }
            })
            .await?;
            info!(subscription = %id, "Registered change subscription");
        }
        Ok(())
    }

    pub async fn account_status(&self) -> AccountStatus {
        self.transport.account_status().await
    }

    pub fn subscription_id(kind: EntityKind) -> String {
        format!("tribeboard-{}-changes", kind.as_str())
    }

    fn known_offline(&self) -> bool {
        self.mode
            .as_ref()
            .map(|rx| rx.borrow().is_offline())
            .unwrap_or(false)
    }

    /// One-shot degrade to an unscoped query when the zone is missing
    /// server-side. Not part of the retry loop: the fallback call runs
    /// exactly once.
    async fn default_zone_fallback<R, Fut>(
        &self,
        f: impl FnOnce() -> Fut,
    ) -> RemoteResult<R>
    where
        Fut: Future<Output = RemoteResult<R>>,
    {
        warn!(zone = %self.codec.zone(), "Zone missing, falling back to default zone");
        self.zone_missing.store(true, Ordering::SeqCst);
        f().await
    }

    async fn with_retry<R, F, Fut>(&self, operation: &str, f: F) -> RemoteResult<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RemoteResult<R>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            if self.known_offline() {
                debug!(operation, "Connectivity known down, failing fast");
                return Err(RemoteError::Network(
                    "connectivity is known to be down".to_string(),
                ));
            }

            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    debug!(operation, error = %err, "Permanent remote error");
                    return Err(err);
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, error = %err, "Retry limit exceeded");
                        return Err(RemoteError::RetryLimitExceeded {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient remote error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = (attempt - 1).min(16);
        let base = self.config.base_delay().saturating_mul(1u32 << exponent);
        let jitter = rand::thread_rng().gen_range(0.0..=0.10);
        base + base.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Family, SyncEntity};
    use crate::domain::value_objects::{InviteCode, ProfileId};
    use crate::infrastructure::remote::InMemoryTransport;
    use std::time::Instant;

    fn fast_config() -> SyncConfig {
        SyncConfig {
            base_delay_ms: 10,
            ..SyncConfig::default()
        }
    }

    fn sample_family() -> SyncEntity {
        SyncEntity::Family(Family::new(
            "Lopez".to_string(),
            InviteCode::new("AB12CD".to_string()).unwrap(),
            ProfileId::generate(),
        ))
    }

    async fn ready_client() -> (Arc<InMemoryTransport>, RemoteSyncClient<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        let client = RemoteSyncClient::new(Arc::clone(&transport), fast_config());
        client.ensure_zone().await.unwrap();
        (transport, client)
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (transport, client) = ready_client().await;
        let entity = sample_family();

        client.upsert(&entity).await.unwrap();
        client.upsert(&entity).await.unwrap();

        assert_eq!(transport.record_count().await, 1);
        let stored = transport
            .get(EntityKind::Family, entity.id())
            .await
            .unwrap();
        assert_eq!(stored.get_str("name"), Some("Lopez"));
    }

    #[tokio::test]
    async fn test_delete_removes_record_remotely() {
        let (transport, client) = ready_client().await;
        let entity = sample_family();
        client.upsert(&entity).await.unwrap();
        assert_eq!(transport.record_count().await, 1);

        client.delete(EntityKind::Family, entity.id()).await.unwrap();

        assert_eq!(transport.record_count().await, 0);
        let found = client
            .fetch_by_id(EntityKind::Family, entity.id())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_yields_limit_error() {
        let (transport, client) = ready_client().await;
        transport
            .fail_next(10, RemoteError::ServiceUnavailable("down".to_string()))
            .await;
        let calls_before = transport.save_call_count().await;

        let started = Instant::now();
        let err = client.upsert(&sample_family()).await.unwrap_err();
        let elapsed = started.elapsed();

        // Exactly max_attempts calls, backoff of at least base * (2^0 + 2^1).
        assert_eq!(transport.save_call_count().await - calls_before, 3);
        assert!(elapsed >= Duration::from_millis(30), "elapsed: {elapsed:?}");
        match err {
            RemoteError::RetryLimitExceeded { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, RemoteError::ServiceUnavailable(_)));
            }
            other => panic!("expected RetryLimitExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_error_aborts_immediately() {
        let (transport, client) = ready_client().await;
        transport.fail_next(1, RemoteError::QuotaExceeded).await;
        let calls_before = transport.save_call_count().await;

        let err = client.upsert(&sample_family()).await.unwrap_err();

        assert!(matches!(err, RemoteError::QuotaExceeded));
        assert_eq!(transport.save_call_count().await - calls_before, 1);
    }

    #[tokio::test]
    async fn test_known_offline_fails_fast_without_network_call() {
        let transport = Arc::new(InMemoryTransport::new());
        let (tx, rx) = watch::channel(SyncMode::Offline);
        let client =
            RemoteSyncClient::new(Arc::clone(&transport), fast_config()).with_connectivity(rx);

        let err = client.upsert(&sample_family()).await.unwrap_err();

        assert!(matches!(err, RemoteError::Network(_)));
        assert_eq!(transport.save_call_count().await, 0);
        drop(tx);
    }

    #[tokio::test]
    async fn test_zone_fallback_is_one_shot() {
        let (transport, client) = ready_client().await;
        let entity = sample_family();
        client.upsert(&entity).await.unwrap();

        // Server-side zone deletion; the zoned query now fails, the
        // fallback still finds the record in the default namespace.
        transport.drop_zone("TribeBoardZone").await;
        let found = client
            .fetch_by_id(EntityKind::Family, entity.id())
            .await
            .unwrap();
        assert!(found.is_some());

        // ensure_zone notices the degrade and re-creates the zone.
        client.ensure_zone().await.unwrap();
        assert!(transport.zone_exists("TribeBoardZone").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_by_predicate_rejects_before_sending() {
        let (transport, client) = ready_client().await;
        let err = client
            .fetch_by_predicate(EntityKind::Family, &Predicate::equals("secret", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidArguments(_)));
        // No remote traffic happened.
        assert_eq!(transport.save_call_count().await, 0);
    }

    #[tokio::test]
    async fn test_fetch_by_predicate_finds_family_by_code() {
        let (_transport, client) = ready_client().await;
        let entity = sample_family();
        client.upsert(&entity).await.unwrap();

        let matches = client
            .fetch_by_predicate(EntityKind::Family, &Predicate::equals("code", "AB12CD"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record_id, entity.id());
    }

    #[tokio::test]
    async fn test_ensure_subscriptions_is_idempotent() {
        let (transport, client) = ready_client().await;

        client.ensure_subscriptions().await.unwrap();
        client.ensure_subscriptions().await.unwrap();

        let ids = transport.subscription_ids().await.unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"tribeboard-family-changes".to_string()));
    }

    #[tokio::test]
    async fn test_batch_upsert_retries_whole_batch_failures() {
        let (transport, client) = ready_client().await;
        let first = sample_family();
        let second = SyncEntity::Family(Family::new(
            "Nguyen".to_string(),
            InviteCode::new("ZZ99YY".to_string()).unwrap(),
            ProfileId::generate(),
        ));

        // One transient whole-batch failure, then success on the retry.
        transport
            .fail_next(1, RemoteError::ServiceUnavailable("blip".to_string()))
            .await;

        let results = client.batch_upsert(&[first, second]).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, outcome)| outcome.is_ok()));
        assert_eq!(transport.record_count().await, 2);
    }

    #[tokio::test]
    async fn test_batch_partial_failure_does_not_abort_batch() {
        let (transport, client) = ready_client().await;
        let good = client.codec().encode(&sample_family());
        let mut stranded = client.codec().encode(&SyncEntity::Family(Family::new(
            "Nguyen".to_string(),
            InviteCode::new("ZZ99YY".to_string()).unwrap(),
            ProfileId::generate(),
        )));
        stranded.zone = Some("NoSuchZone".to_string());

        let results = transport
            .save_records(vec![good.clone(), stranded.clone()])
            .await
            .unwrap();

        let (_, good_outcome) = results
            .iter()
            .find(|(id, _)| *id == good.record_id)
            .unwrap();
        let (_, stranded_outcome) = results
            .iter()
            .find(|(id, _)| *id == stranded.record_id)
            .unwrap();
        assert!(good_outcome.is_ok());
        assert!(matches!(
            stranded_outcome,
            Err(RemoteError::ZoneNotFound(_))
        ));
        // The good record still landed.
        assert_eq!(transport.record_count().await, 1);
    }
}

use crate::application::ports::{LocalStore, RemoteTransport};
use crate::domain::entities::SyncEntity;
use crate::domain::value_objects::{EntityKind, MembershipStatus, RecordVersion, SyncMode};
use crate::infrastructure::remote::{RemoteRecord, RemoteSyncClient};
use crate::shared::config::SyncConfig;
use crate::shared::error::{RemoteError, RemoteResult, SyncError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{ChangeReason, ConnectivityEvent, RemoteNotification, SyncEvent, SyncStatus};

const EVENT_CHANNEL_CAPACITY: usize = 64;

enum UploadOutcome {
    /// Remote write confirmed; the record is clean (or was re-edited
    /// mid-upload and stays dirty for the next pass).
    Uploaded,
    /// Conflict resolved in favor of the remote copy; local overwritten.
    RemoteKept,
    Failed {
        reason: String,
        quarantine: bool,
        surfaced: bool,
    },
}

/// Drives synchronization passes: decides when to sync (reconnect, timer,
/// explicit request), what to upload (the dirty set, parents first), and how
/// inbound remote changes reconcile with local state (last-writer-wins per
/// record, local wins ties).
///
/// All sync bookkeeping mutations funnel through here and the store; a
/// try-lock drops overlapping passes instead of queueing them.
pub struct SyncOrchestrator<T: RemoteTransport> {
    store: Arc<dyn LocalStore>,
    client: Arc<RemoteSyncClient<T>>,
    config: SyncConfig,
    mode_rx: watch::Receiver<SyncMode>,
    status: Arc<RwLock<SyncStatus>>,
    /// Bumped on every status write so a delayed reset-to-idle can tell
    /// whether a newer pass has taken over the status.
    status_generation: Arc<AtomicU64>,
    events_tx: broadcast::Sender<SyncEvent>,
    pass_lock: Mutex<()>,
    /// Records whose upload failed permanently. Skipped by periodic passes;
    /// cleared on explicit `sync_now` or restart.
    quarantine: Mutex<HashSet<(EntityKind, Uuid)>>,
    last_pass_at: RwLock<Option<DateTime<Utc>>>,
}

impl<T: RemoteTransport + 'static> SyncOrchestrator<T> {
    pub fn new(
        store: Arc<dyn LocalStore>,
        client: Arc<RemoteSyncClient<T>>,
        config: SyncConfig,
        mode_rx: watch::Receiver<SyncMode>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            client,
            config,
            mode_rx,
            status: Arc::new(RwLock::new(SyncStatus::Idle)),
            status_generation: Arc::new(AtomicU64::new(0)),
            events_tx,
            pass_lock: Mutex::new(()),
            quarantine: Mutex::new(HashSet::new()),
            last_pass_at: RwLock::new(None),
        }
    }

    /// Idempotent remote setup, safe to call on every start.
    pub async fn prepare(&self) -> RemoteResult<()> {
        self.client.ensure_zone().await?;
        self.client.ensure_subscriptions().await?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    pub async fn last_pass_at(&self) -> Option<DateTime<Utc>> {
        *self.last_pass_at.read().await
    }

    /// Explicit user-requested sync. Quarantined records get another chance.
    pub async fn sync_now(&self) {
        self.quarantine.lock().await.clear();
        self.run_pass("manual").await;
    }

    /// Background loop: periodic backstop timer plus reconnect-triggered
    /// passes with a settle delay against flapping connectivity.
    pub fn start(
        self: Arc<Self>,
        mut connectivity: broadcast::Receiver<ConnectivityEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.sync_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.mode_rx.borrow().is_offline() {
                            continue;
                        }
                        match self.store.pending_count().await {
                            Ok(0) => {}
                            Ok(_) => self.run_pass("periodic").await,
                            Err(err) => {
                                warn!(error = %err, "Could not count pending records");
                            }
                        }
                    }
                    event = connectivity.recv() => match event {
                        Ok(ConnectivityEvent::WentOnline) => {
                            let _ = self.events_tx.send(SyncEvent::ModeChanged(SyncMode::Online));
                            tokio::time::sleep(self.config.settle_delay()).await;
                            if !self.mode_rx.borrow().is_offline() {
                                self.run_pass("reconnect").await;
                            }
                        }
                        Ok(ConnectivityEvent::WentOffline { pending }) => {
                            info!(pending, "Offline with records waiting to sync");
                            let _ = self.events_tx.send(SyncEvent::ModeChanged(SyncMode::Offline));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Connectivity event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        })
    }

    async fn run_pass(&self, trigger: &str) {
        if self.mode_rx.borrow().is_offline() {
            debug!(trigger, "Offline, skipping sync pass");
            return;
        }
        let _guard = match self.pass_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(trigger, "A pass is already in flight, dropping trigger");
                return;
            }
        };

        let quarantined = self.quarantine.lock().await.clone();
        let mut phases: Vec<Vec<SyncEntity>> = Vec::with_capacity(EntityKind::UPLOAD_ORDER.len());
        let mut surfaced_failures: Vec<String> = Vec::new();
        for kind in EntityKind::UPLOAD_ORDER {
            match self.store.fetch_dirty(kind).await {
                Ok(records) => phases.push(
                    records
                        .into_iter()
                        .filter(|r| !quarantined.contains(&(r.kind(), r.id())))
                        .collect(),
                ),
                Err(err) => {
                    warn!(kind = %kind, error = %err, "Could not read dirty records");
                    surfaced_failures.push(err.to_string());
                    phases.push(Vec::new());
                }
            }
        }

        let total: usize = phases.iter().map(Vec::len).sum();
        if total == 0 && surfaced_failures.is_empty() {
            debug!(trigger, "Nothing to sync");
            self.set_status(SyncStatus::Idle).await;
            return;
        }

        info!(trigger, total, "Starting sync pass");
        self.set_status(SyncStatus::Syncing { progress: 0.0 }).await;

        let mut uploaded = 0usize;
        let mut failed = 0usize;
        let phase_count = phases.len() as f32;
        for (phase_index, records) in phases.iter().enumerate() {
            let phase_total = records.len().max(1) as f32;
            for (record_index, entity) in records.iter().enumerate() {
                match self.upload_one(entity).await {
                    UploadOutcome::Uploaded | UploadOutcome::RemoteKept => uploaded += 1,
                    UploadOutcome::Failed {
                        reason,
                        quarantine,
                        surfaced,
                    } => {
                        failed += 1;
                        if quarantine {
                            self.quarantine
                                .lock()
                                .await
                                .insert((entity.kind(), entity.id()));
                        }
                        if surfaced {
                            surfaced_failures.push(reason);
                        }
                    }
                }
                let progress =
                    (phase_index as f32 + (record_index + 1) as f32 / phase_total) / phase_count;
                self.set_status(SyncStatus::Syncing { progress }).await;
            }
        }

        if let Err(err) = self.store.save().await {
            surfaced_failures.push(err.to_string());
        }
        *self.last_pass_at.write().await = Some(Utc::now());

        info!(trigger, uploaded, failed, "Sync pass finished");
        let status = if surfaced_failures.is_empty() {
            SyncStatus::Completed
        } else {
            SyncStatus::Failed(surfaced_failures.join("; "))
        };
        self.set_status(status).await;
        let _ = self
            .events_tx
            .send(SyncEvent::PassCompleted { uploaded, failed });
        self.schedule_status_reset();
    }

    async fn upload_one(&self, entity: &SyncEntity) -> UploadOutcome {
        let kind = entity.kind();
        let id = entity.id();
        let version = entity.version();
        match self.client.upsert(entity).await {
            Ok(stored) => self.confirm_upload(kind, id, version, stored.modified_at).await,
            Err(RemoteError::ServerRecordChanged(_)) => self.resolve_and_retry(entity).await,
            Err(err) => self.classify_failure(kind, id, &err),
        }
    }

    async fn confirm_upload(
        &self,
        kind: EntityKind,
        id: Uuid,
        version: RecordVersion,
        at: DateTime<Utc>,
    ) -> UploadOutcome {
        match self.store.mark_synced(kind, id, version, at).await {
            Ok(true) => {
                debug!(kind = %kind, id = %id, "Uploaded");
                UploadOutcome::Uploaded
            }
            Ok(false) => {
                debug!(kind = %kind, id = %id, "Re-edited during upload, stays dirty");
                UploadOutcome::Uploaded
            }
            Err(err) => UploadOutcome::Failed {
                reason: err.to_string(),
                quarantine: false,
                surfaced: true,
            },
        }
    }

    /// The server rejected the update because its copy changed underneath
    /// us: fetch latest, run conflict resolution, retry the upload once if
    /// local still wins.
    async fn resolve_and_retry(&self, entity: &SyncEntity) -> UploadOutcome {
        let kind = entity.kind();
        let id = entity.id();
        let remote = match self.client.fetch_by_id(kind, id).await {
            Ok(remote) => remote,
            Err(err) => return self.classify_failure(kind, id, &err),
        };

        if let Some(record) = &remote {
            let local_time = entity.sync().last_sync_date;
            if Self::remote_wins(local_time, record.modified_at) {
                debug!(
                    kind = %kind,
                    id = %id,
                    local = ?local_time,
                    remote = %record.modified_at,
                    winner = "remote",
                    "Upload conflict resolved"
                );
                return match self.accept_remote_record(record).await {
                    Ok(()) => UploadOutcome::RemoteKept,
                    Err(err) => UploadOutcome::Failed {
                        reason: err.to_string(),
                        quarantine: false,
                        surfaced: true,
                    },
                };
            }
            debug!(
                kind = %kind,
                id = %id,
                local = ?local_time,
                remote = %record.modified_at,
                winner = "local",
                "Upload conflict resolved, retrying upload once"
            );
        }

        match self.client.upsert(entity).await {
            Ok(stored) => {
                self.confirm_upload(kind, id, entity.version(), stored.modified_at)
                    .await
            }
            Err(err) => self.classify_failure(kind, id, &err),
        }
    }

    fn classify_failure(&self, kind: EntityKind, id: Uuid, err: &RemoteError) -> UploadOutcome {
        let network = err.is_network_related();
        let exhausted = matches!(err, RemoteError::RetryLimitExceeded { .. });
        // Permanent errors are quarantined so automatic passes stop
        // hammering them; retry exhaustion and connectivity failures leave
        // the record dirty for the next pass.
        let permanent = !network && !exhausted && !err.is_retryable();
        if network {
            debug!(kind = %kind, id = %id, error = %err, "Upload deferred, record stays dirty");
        } else {
            warn!(kind = %kind, id = %id, error = %err, "Upload failed");
        }
        UploadOutcome::Failed {
            reason: err.to_string(),
            quarantine: permanent,
            surfaced: permanent,
        }
    }

    /// Inbound change notification: re-fetch the record by id and reconcile
    /// with last-writer-wins. The notification payload itself carries no
    /// field data.
    pub async fn handle_remote_notification(
        &self,
        notification: RemoteNotification,
    ) -> Result<(), SyncError> {
        debug!(
            kind = %notification.kind,
            id = %notification.record_id,
            reason = ?notification.reason,
            "Remote change notification"
        );
        if notification.reason == ChangeReason::Deleted {
            return self
                .apply_remote_deletion(notification.kind, notification.record_id)
                .await;
        }

        let record = match self
            .client
            .fetch_by_id(notification.kind, notification.record_id)
            .await?
        {
            Some(record) => record,
            None => {
                debug!(id = %notification.record_id, "Record already gone remotely");
                return Ok(());
            }
        };

        match self
            .store
            .fetch_entity(notification.kind, notification.record_id)
            .await?
        {
            None => self.accept_remote_record(&record).await,
            Some(local) => {
                let local_time = local.sync().last_sync_date;
                let winner = if Self::remote_wins(local_time, record.modified_at) {
                    "remote"
                } else {
                    "local"
                };
                debug!(
                    kind = %notification.kind,
                    id = %notification.record_id,
                    local = ?local_time,
                    remote = %record.modified_at,
                    winner,
                    "Conflict resolved"
                );
                if winner == "remote" {
                    self.accept_remote_record(&record).await
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Remote deletions only soft-remove memberships; families and profiles
    /// are never physically deleted locally.
    async fn apply_remote_deletion(&self, kind: EntityKind, id: Uuid) -> Result<(), SyncError> {
        match self.store.fetch_entity(kind, id).await? {
            Some(SyncEntity::Membership(mut membership)) => {
                if membership.status != MembershipStatus::Removed {
                    membership.status = MembershipStatus::Removed;
                    self.store
                        .apply_remote(SyncEntity::Membership(membership), Utc::now())
                        .await?;
                    let _ = self.events_tx.send(SyncEvent::RecordChanged {
                        kind,
                        record_id: id,
                    });
                }
                Ok(())
            }
            Some(_) => {
                warn!(kind = %kind, id = %id, "Ignoring remote deletion of non-membership record");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn accept_remote_record(&self, record: &RemoteRecord) -> Result<(), SyncError> {
        let entity = self.client.codec().decode(record)?;
        let kind = entity.kind();
        let id = entity.id();
        self.store.apply_remote(entity, record.modified_at).await?;
        let _ = self.events_tx.send(SyncEvent::RecordChanged {
            kind,
            record_id: id,
        });
        Ok(())
    }

    /// Last-writer-wins at record granularity. Ties keep local; a local
    /// record that was never confirmed against the remote loses.
    fn remote_wins(local: Option<DateTime<Utc>>, remote: DateTime<Utc>) -> bool {
        match local {
            Some(local) => remote > local,
            None => true,
        }
    }

    async fn set_status(&self, status: SyncStatus) {
        self.status_generation.fetch_add(1, Ordering::SeqCst);
        *self.status.write().await = status.clone();
        let _ = self.events_tx.send(SyncEvent::StatusChanged(status));
    }

    /// Resets a terminal status back to `Idle` after the display window,
    /// unless a newer pass has set the status since.
    fn schedule_status_reset(&self) {
        let status = Arc::clone(&self.status);
        let generation = Arc::clone(&self.status_generation);
        let events_tx = self.events_tx.clone();
        let window = self.config.status_display();
        let expected = generation.load(Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if generation.load(Ordering::SeqCst) != expected {
                return;
            }
            let mut current = status.write().await;
            if matches!(*current, SyncStatus::Completed | SyncStatus::Failed(_)) {
                *current = SyncStatus::Idle;
                let _ = events_tx.send(SyncEvent::StatusChanged(SyncStatus::Idle));
            }
        });
    }
}

use crate::application::ports::remote_transport::{AccountStatus, RemoteTransport};
use crate::domain::value_objects::EntityKind;
use crate::shared::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::predicate::Predicate;
use super::record::RemoteRecord;

#[derive(Default)]
struct TransportState {
    zones: HashSet<String>,
    records: HashMap<(EntityKind, Uuid), RemoteRecord>,
    subscriptions: HashSet<String>,
    account_status: AccountStatus,
    /// Scripted failures, consumed one per incoming call.
    failures: VecDeque<RemoteError>,
    save_calls: u64,
}

/// In-process implementation of [`RemoteTransport`] over a record map.
///
/// Backs the test suite and the demo configuration. Failures can be
/// scripted per call to exercise the retry and fallback paths.
#[derive(Default)]
pub struct InMemoryTransport {
    state: RwLock<TransportState>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let mut state = TransportState::default();
        state.account_status = AccountStatus::Available;
        Self {
            state: RwLock::new(state),
        }
    }

    /// Queues `err` to be returned by the next `count` record calls.
    pub async fn fail_next(&self, count: usize, err: RemoteError) {
        let mut state = self.state.write().await;
        for _ in 0..count {
            state.failures.push_back(err.clone());
        }
    }

    pub async fn set_account_status(&self, status: AccountStatus) {
        self.state.write().await.account_status = status;
    }

    /// Simulates a server-side zone deletion.
    pub async fn drop_zone(&self, name: &str) {
        self.state.write().await.zones.remove(name);
    }

    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn get(&self, kind: EntityKind, id: Uuid) -> Option<RemoteRecord> {
        self.state.read().await.records.get(&(kind, id)).cloned()
    }

    /// Stores a record directly, bypassing zone checks. Test seam for
    /// simulating changes made by another device.
    pub async fn put(&self, record: RemoteRecord) {
        let mut state = self.state.write().await;
        state
            .records
            .insert((record.kind, record.record_id), record);
    }

    pub async fn save_call_count(&self) -> u64 {
        self.state.read().await.save_calls
    }

    fn take_failure(state: &mut TransportState) -> Option<RemoteError> {
        state.failures.pop_front()
    }

    fn check_zone(state: &TransportState, zone: Option<&str>) -> RemoteResult<()> {
        if let Some(zone) = zone {
            if !state.zones.contains(zone) {
                return Err(RemoteError::ZoneNotFound(zone.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTransport for InMemoryTransport {
    async fn save_record(&self, record: RemoteRecord) -> RemoteResult<RemoteRecord> {
        let mut state = self.state.write().await;
        state.save_calls += 1;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }
        Self::check_zone(&state, record.zone.as_deref())?;

        let mut stored = record;
        stored.modified_at = Utc::now();
        state
            .records
            .insert((stored.kind, stored.record_id), stored.clone());
        Ok(stored)
    }

    async fn save_records(
        &self,
        records: Vec<RemoteRecord>,
    ) -> RemoteResult<Vec<(Uuid, RemoteResult<RemoteRecord>)>> {
        let mut state = self.state.write().await;
        state.save_calls += 1;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let id = record.record_id;
            let outcome = match Self::check_zone(&state, record.zone.as_deref()) {
                Ok(()) => {
                    let mut stored = record;
                    stored.modified_at = Utc::now();
                    state
                        .records
                        .insert((stored.kind, stored.record_id), stored.clone());
                    Ok(stored)
                }
                Err(err) => Err(err),
            };
            results.push((id, outcome));
        }
        Ok(results)
    }

    async fn fetch_record(
        &self,
        kind: EntityKind,
        id: Uuid,
        zone: Option<&str>,
    ) -> RemoteResult<Option<RemoteRecord>> {
        let mut state = self.state.write().await;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }
        Self::check_zone(&state, zone)?;
        Ok(state.records.get(&(kind, id)).cloned())
    }

    async fn query_records(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        zone: Option<&str>,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let mut state = self.state.write().await;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }
        Self::check_zone(&state, zone)?;
        Ok(state
            .records
            .values()
            .filter(|record| record.kind == kind && predicate.matches(record))
            .cloned()
            .collect())
    }

    async fn delete_record(
        &self,
        kind: EntityKind,
        id: Uuid,
        zone: Option<&str>,
    ) -> RemoteResult<()> {
        let mut state = self.state.write().await;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }
        Self::check_zone(&state, zone)?;
        state.records.remove(&(kind, id));
        Ok(())
    }

    async fn create_zone(&self, name: &str) -> RemoteResult<()> {
        let mut state = self.state.write().await;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }
        state.zones.insert(name.to_string());
        Ok(())
    }

    async fn zone_exists(&self, name: &str) -> RemoteResult<bool> {
        let state = self.state.read().await;
        Ok(state.zones.contains(name))
    }

    async fn subscription_ids(&self) -> RemoteResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().cloned().collect())
    }

    async fn create_subscription(
        &self,
        id: &str,
        _kind: EntityKind,
        _zone: &str,
    ) -> RemoteResult<()> {
        let mut state = self.state.write().await;
        if let Some(err) = Self::take_failure(&mut state) {
            return Err(err);
        }
        state.subscriptions.insert(id.to_string());
        Ok(())
    }

    async fn account_status(&self) -> AccountStatus {
        self.state.read().await.account_status
    }
}

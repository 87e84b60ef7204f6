use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tribeboard_sync::{
    AccountStatus, EntityKind, InMemoryTransport, LocalStore, SyncConfig, SyncEngine, SyncMode,
};

fn fast_config() -> SyncConfig {
    SyncConfig {
        base_delay_ms: 10,
        settle_delay_ms: 10,
        status_display_ms: 50,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn offline_edits_replay_after_reconnect() {
    let dir = TempDir::new().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("tribeboard.db").display()
    );
    let transport = Arc::new(InMemoryTransport::new());
    let engine = SyncEngine::bootstrap(&url, Arc::clone(&transport), fast_config())
        .await
        .unwrap();
    let handle = engine.start().await.unwrap();

    engine.connectivity.report_network(false).await;
    engine
        .connectivity
        .report_account(AccountStatus::Available)
        .await;
    assert_eq!(engine.connectivity.mode(), SyncMode::Offline);

    let creator = engine
        .store
        .create_profile("Maria", "hash-maria", None)
        .await
        .unwrap();
    let (family, _) = engine
        .families
        .create_family("Lopez", creator.id)
        .await
        .unwrap();
    assert_eq!(engine.store.pending_count().await.unwrap(), 3);
    assert_eq!(transport.record_count().await, 0);

    engine.connectivity.report_network(true).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(engine.store.pending_count().await.unwrap(), 0);
    assert_eq!(transport.record_count().await, 3);
    let remote = transport
        .get(EntityKind::Family, family.id.as_uuid())
        .await
        .unwrap();
    assert_eq!(remote.get_str("name"), Some("Lopez"));
    handle.abort();
}

#[tokio::test]
async fn dirty_records_survive_restart() {
    let dir = TempDir::new().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("tribeboard.db").display()
    );

    {
        let transport = Arc::new(InMemoryTransport::new());
        let engine = SyncEngine::bootstrap(&url, transport, fast_config())
            .await
            .unwrap();
        let creator = engine
            .store
            .create_profile("Maria", "hash-maria", None)
            .await
            .unwrap();
        engine
            .families
            .create_family("Lopez", creator.id)
            .await
            .unwrap();
        assert_eq!(engine.store.pending_count().await.unwrap(), 3);
    }

    let transport = Arc::new(InMemoryTransport::new());
    let engine = SyncEngine::bootstrap(&url, Arc::clone(&transport), fast_config())
        .await
        .unwrap();
    assert_eq!(engine.store.pending_count().await.unwrap(), 3);

    engine.connectivity.report_network(true).await;
    engine
        .connectivity
        .report_account(AccountStatus::Available)
        .await;
    engine.orchestrator.prepare().await.unwrap();
    engine.orchestrator.sync_now().await;

    assert_eq!(engine.store.pending_count().await.unwrap(), 0);
    assert_eq!(transport.record_count().await, 3);
}

use crate::application::ports::{LocalStore, RemoteTransport};
use crate::application::services::{ConnectivityMonitor, FamilyService, SyncOrchestrator};
use crate::infrastructure::database::SqliteLocalStore;
use crate::infrastructure::remote::{InMemoryTransport, RemoteSyncClient};
use crate::shared::config::SyncConfig;
use crate::shared::validation::BasicValidator;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Top-level wiring for the sync engine: store, connectivity monitor,
/// remote client, and orchestrator constructed as plain values and handed
/// out as shared handles. No ambient global state.
pub struct SyncEngine<T: RemoteTransport> {
    pub store: Arc<SqliteLocalStore>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub orchestrator: Arc<SyncOrchestrator<T>>,
    pub families: FamilyService,
}

impl<T: RemoteTransport + 'static> SyncEngine<T> {
    pub async fn bootstrap(
        database_url: &str,
        transport: Arc<T>,
        config: SyncConfig,
    ) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::wire(pool, transport, config).await
    }

    async fn wire(
        pool: sqlx::Pool<sqlx::Sqlite>,
        transport: Arc<T>,
        config: SyncConfig,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteLocalStore::new(pool, Arc::new(BasicValidator)));
        store.initialize().await?;
        let store_port: Arc<dyn LocalStore> = store.clone();

        let connectivity = Arc::new(ConnectivityMonitor::new(store_port.clone()));
        let client = Arc::new(
            RemoteSyncClient::new(transport, config.clone())
                .with_connectivity(connectivity.subscribe_mode()),
        );
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store_port.clone(),
            client,
            config,
            connectivity.subscribe_mode(),
        ));
        let families = FamilyService::new(store_port);

        info!("Sync engine wired");
        Ok(Self {
            store,
            connectivity,
            orchestrator,
            families,
        })
    }

    /// Runs the idempotent remote setup and spawns the background sync loop.
    pub async fn start(&self) -> anyhow::Result<JoinHandle<()>> {
        self.orchestrator.prepare().await?;
        let handle = Arc::clone(&self.orchestrator).start(self.connectivity.subscribe_events());
        Ok(handle)
    }
}

impl SyncEngine<InMemoryTransport> {
    /// Fully in-process engine: in-memory SQLite plus the in-memory remote
    /// transport. Demo and test configuration.
    pub async fn bootstrap_in_memory(config: SyncConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;

        // In-memory SQLite needs a single connection; each connection would
        // otherwise get its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::wire(pool, Arc::new(InMemoryTransport::new()), config).await
    }
}

use crate::application::ports::{AccountStatus, LocalStore};
use crate::domain::value_objects::SyncMode;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use super::events::ConnectivityEvent;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
struct Signals {
    network_reachable: Option<bool>,
    account: AccountStatus,
}

impl Signals {
    /// Offline wins whenever either signal is known bad; the mode stays
    /// `Unknown` until both signals have reported at least once.
    fn mode(&self) -> SyncMode {
        match self.network_reachable {
            Some(false) => SyncMode::Offline,
            Some(true) => match self.account {
                AccountStatus::Available => SyncMode::Online,
                AccountStatus::Unavailable | AccountStatus::Restricted => SyncMode::Offline,
                AccountStatus::Unknown => SyncMode::Unknown,
            },
            None => {
                if matches!(
                    self.account,
                    AccountStatus::Unavailable | AccountStatus::Restricted
                ) {
                    SyncMode::Offline
                } else {
                    SyncMode::Unknown
                }
            }
        }
    }
}

/// Combines network reachability and remote account availability into one
/// [`SyncMode`], published on a watch channel. Transitions additionally go
/// out as [`ConnectivityEvent`]s; the offline event carries the pending
/// dirty-record count so the app can summarize what is waiting.
pub struct ConnectivityMonitor {
    store: Arc<dyn LocalStore>,
    signals: Mutex<Signals>,
    mode_tx: watch::Sender<SyncMode>,
    events_tx: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        let (mode_tx, _) = watch::channel(SyncMode::Unknown);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            signals: Mutex::new(Signals::default()),
            mode_tx,
            events_tx,
        }
    }

    pub fn mode(&self) -> SyncMode {
        *self.mode_tx.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<SyncMode> {
        self.mode_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events_tx.subscribe()
    }

    /// Feeds the network-reachability signal.
    pub async fn report_network(&self, reachable: bool) {
        let mut signals = self.signals.lock().await;
        signals.network_reachable = Some(reachable);
        let mode = signals.mode();
        drop(signals);
        self.transition(mode).await;
    }

    /// Feeds the remote account-availability signal. The monitor does not
    /// poll the remote store itself; the embedding app sources this from
    /// `RemoteSyncClient::account_status` (at startup and on platform
    /// account-change notifications) and reports the result here.
    pub async fn report_account(&self, status: AccountStatus) {
        let mut signals = self.signals.lock().await;
        signals.account = status;
        let mode = signals.mode();
        drop(signals);
        self.transition(mode).await;
    }

    async fn transition(&self, next: SyncMode) {
        let previous = *self.mode_tx.borrow();
        if previous == next {
            return;
        }
        info!(from = %previous, to = %next, "Connectivity mode changed");
        self.mode_tx.send_replace(next);

        match next {
            SyncMode::Offline => {
                let pending = match self.store.pending_count().await {
                    Ok(count) => count,
                    Err(err) => {
                        warn!(error = %err, "Could not count pending records");
                        0
                    }
                };
                let _ = self
                    .events_tx
                    .send(ConnectivityEvent::WentOffline { pending });
            }
            SyncMode::Online => {
                let _ = self.events_tx.send(ConnectivityEvent::WentOnline);
            }
            SyncMode::Unknown => {
                debug!("Connectivity mode is unknown");
            }
        }
    }
}

use chrono::Local;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::alerts;
use crate::config::AppConfig;
use crate::dashboard::{self, DashboardRenderer};
use crate::health::{HealthEvent, HealthMonitor, HealthReport};
use crate::models::{MessageId, ProductRecord, Target};
use crate::plugins::{Notifier, PluginManager};
use crate::reconcile::Reconciler;
use crate::store::StockStore;
use crate::utils::error::Result;

/// State shared by all workers, guarded by one lock.
#[derive(Debug)]
pub struct WatchState {
    pub store: StockStore,
    pub health: HealthMonitor,
    /// True until the first cycle over a store that had no saved history
    /// has finished.
    pub cold_start: bool,
    /// The last dashboard publish left at least one page unsent or stale.
    pub dashboard_pending: bool,
}

/// Owns the store and the collaborators a scan cycle needs.
///
/// Lifecycle: [`Watcher::new`], [`Watcher::load`], repeated
/// [`run_cycle`](Watcher::run_cycle), [`Watcher::shutdown`].
pub struct Watcher {
    pub(crate) state: Mutex<WatchState>,
    pub(crate) plugins: PluginManager,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) reconciler: Reconciler,
    pub(crate) renderer: DashboardRenderer,
    pub(crate) max_concurrent_per_origin: usize,
    pub(crate) jitter_ms: u64,
    state_path: PathBuf,
    started_at: Instant,
}

impl Watcher {
    pub fn new(config: &AppConfig, plugins: PluginManager, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: Mutex::new(WatchState {
                store: StockStore::new(),
                health: HealthMonitor::new(config.alerts.failure_threshold),
                cold_start: true,
                dashboard_pending: false,
            }),
            plugins,
            notifier,
            reconciler: Reconciler::new(
                config.identity.clone(),
                config.alerts.stale_after_cycles,
            ),
            renderer: DashboardRenderer::new(config.dashboard.max_page_length),
            max_concurrent_per_origin: config.scraper.max_concurrent_per_origin,
            jitter_ms: config.scraper.jitter_ms,
            state_path: config.storage.state_path.clone(),
            started_at: Instant::now(),
        }
    }

    /// Replace the in-memory store with the saved one.
    pub async fn load(&self) {
        let store = StockStore::load(&self.state_path).await;
        let mut state = self.state.lock().await;
        state.cold_start = !store.had_history();
        info!(
            records = store.len(),
            alerts = store.alert_count(),
            cold_start = state.cold_start,
            "state loaded"
        );
        state.store = store;
    }

    /// Snapshot under the lock, write after releasing it.
    pub async fn save(&self) -> Result<()> {
        let document = {
            let state = self.state.lock().await;
            state.store.to_document()
        };
        StockStore::write_document(&document, &self.state_path).await
    }

    pub async fn shutdown(&self) {
        match self.save().await {
            Ok(()) => info!(path = %self.state_path.display(), "state saved on shutdown"),
            Err(e) => error!(error = %e, "failed to save state on shutdown"),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Read access to the store for callers outside a cycle.
    pub async fn with_store<R>(&self, f: impl FnOnce(&StockStore) -> R) -> R {
        let state = self.state.lock().await;
        f(&state.store)
    }

    pub async fn is_cold_start(&self) -> bool {
        self.state.lock().await.cold_start
    }

    /// Current dashboard texts, as answered to a status query.
    pub async fn status_pages(&self) -> Vec<String> {
        let state = self.state.lock().await;
        self.renderer
            .render(state.store.records(), Local::now())
            .iter()
            .map(|page| page.text())
            .collect()
    }

    pub async fn health_report(&self) -> HealthReport {
        let state = self.state.lock().await;
        HealthReport {
            uptime: self.started_at.elapsed(),
            consecutive_failures: state.health.consecutive_failures(),
            escalated: state.health.is_escalated(),
            tracked: state.store.len(),
            in_stock: state.store.in_stock_count(),
            live_alerts: state.store.alert_count(),
        }
    }

    /// Re-render and publish the dashboard. The lock is held while
    /// publishing so message-id updates never interleave. Unless `changed`,
    /// this only runs when there is data but nothing is published yet, or
    /// when the previous publish failed for some page.
    pub async fn refresh_dashboard(&self, changed: bool) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let unpublished =
            state.store.dashboard_messages().is_empty() && !state.store.is_empty();
        if !changed && !unpublished && !state.dashboard_pending {
            return;
        }

        let pages = self.renderer.render(state.store.records(), Local::now());
        let mut message_ids = std::mem::take(state.store.dashboard_messages_mut());
        let summary = dashboard::publish(self.notifier.as_ref(), &mut message_ids, &pages).await;
        *state.store.dashboard_messages_mut() = message_ids;
        state.dashboard_pending = summary.failed > 0;

        info!(
            pages = pages.len(),
            edited = summary.edited,
            sent = summary.sent,
            deleted = summary.deleted,
            failed = summary.failed,
            "dashboard refreshed"
        );
    }

    /// Send one alert per restocked record. A sent alert is registered only
    /// if the item is still in stock by then; otherwise it is taken back.
    pub async fn send_restock_alerts(&self, restocked: Vec<ProductRecord>) {
        for record in restocked {
            let message_id = match self.notifier.send(&alerts::restock_message(&record)).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(identity = %record.identity, error = %e, "failed to send restock alert");
                    continue;
                }
            };
            metrics::counter!("watcher_restock_alerts_total").increment(1);

            let stale = {
                let mut state = self.state.lock().await;
                let still_in_stock = state
                    .store
                    .get(&record.identity)
                    .is_some_and(|r| r.is_in_stock());
                if still_in_stock {
                    state.store.register_alert(&record.identity, message_id)
                } else {
                    Some(message_id)
                }
            };

            info!(identity = %record.identity, message_id, "restock alert sent");
            if let Some(stale) = stale {
                self.retract(vec![stale]).await;
            }
        }
    }

    /// Best-effort delete of alert messages already removed from the registry.
    pub async fn retract(&self, message_ids: Vec<MessageId>) {
        for message_id in message_ids {
            match self.notifier.delete(message_id).await {
                Ok(()) => info!(message_id, "alert retracted"),
                Err(e) => warn!(message_id, error = %e, "failed to retract alert"),
            }
        }
    }

    /// Drop records of targets that are no longer configured. Returns whether
    /// anything was removed.
    pub async fn purge_stale(&self, targets: &[Target]) -> bool {
        let valid: HashSet<String> = targets
            .iter()
            .flat_map(|t| [t.url.clone(), t.public_url()])
            .collect();

        let purge = {
            let mut state = self.state.lock().await;
            state.store.purge_missing(&valid)
        };

        if purge.removed > 0 || !purge.retracted.is_empty() {
            info!(
                removed = purge.removed,
                retracted = purge.retracted.len(),
                "purged records of removed targets"
            );
        }
        self.retract(purge.retracted).await;
        purge.removed > 0
    }

    /// Feed a cycle outcome to the health monitor and send any resulting
    /// operator notice.
    pub async fn record_health(&self, had_error: bool) {
        let (event, failures) = {
            let mut state = self.state.lock().await;
            let event = state.health.record_cycle(had_error);
            (event, state.health.consecutive_failures())
        };
        metrics::gauge!("watcher_consecutive_failed_cycles").set(failures as f64);

        let text = match event {
            Some(HealthEvent::Escalate { failures }) => {
                error!(failures, "scan cycles keep failing, escalating");
                alerts::escalation_message(failures)
            }
            Some(HealthEvent::Recover { failures }) => {
                info!(failures, "scan cycles recovered");
                alerts::recovery_message(failures)
            }
            None => return,
        };

        if let Err(e) = self.notifier.send(&text).await {
            warn!(error = %e, "failed to send health notice");
        }
    }
}

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::team_store::TeamStore,
    error::ServiceError,
    services::{insights_service::InsightsGenerator, response_cache::ResponseCache},
};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the storage handle, the response cache,
/// and the per-sheet write gates.
pub struct AppState {
    config: AppConfig,
    team_store: RwLock<Option<Arc<dyn TeamStore>>>,
    response_cache: ResponseCache,
    degraded: watch::Sender<bool>,
    write_gates: DashMap<String, Arc<Mutex<()>>>,
    insights: Arc<dyn InsightsGenerator>,
    http_client: reqwest::Client,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, insights: Arc<dyn InsightsGenerator>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            team_store: RwLock::new(None),
            response_cache: ResponseCache::new(),
            degraded: degraded_tx,
            write_gates: DashMap::new(),
            insights,
            http_client: reqwest::Client::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current team store, if one is installed.
    pub async fn team_store(&self) -> Option<Arc<dyn TeamStore>> {
        let guard = self.team_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the team store or fail with the degraded-mode error.
    pub async fn require_team_store(&self) -> Result<Arc<dyn TeamStore>, ServiceError> {
        self.team_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new team store implementation and leave degraded mode.
    pub async fn install_team_store(&self, store: Arc<dyn TeamStore>) {
        {
            let mut guard = self.team_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current team store and enter degraded mode.
    pub async fn clear_team_store(&self) {
        {
            let mut guard = self.team_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Server-side response cache fronting expensive reads.
    pub fn response_cache(&self) -> &ResponseCache {
        &self.response_cache
    }

    /// Per-sheet gate serializing the compare-then-write of a save.
    ///
    /// The backing store has no conditional write, so two writers inside one
    /// process are serialized here; writers on different processes still race
    /// within the window the staleness check leaves open.
    pub fn write_gate(&self, sheet_name: &str) -> Arc<Mutex<()>> {
        self.write_gates
            .entry(sheet_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Generator backing the insight actions.
    pub fn insights_generator(&self) -> Arc<dyn InsightsGenerator> {
        self.insights.clone()
    }

    /// Shared HTTP client for upstream calls (fixture API).
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::team_store::memory::MemoryTeamStore;
    use crate::services::insights_service::StaticInsightsGenerator;

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(StaticInsightsGenerator))
    }

    #[tokio::test]
    async fn starts_degraded_until_store_installed() {
        let state = state();
        assert!(state.is_degraded());
        assert!(state.require_team_store().await.is_err());

        state
            .install_team_store(Arc::new(MemoryTeamStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(state.require_team_store().await.is_ok());

        state.clear_team_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn write_gate_is_shared_per_sheet() {
        let state = state();
        let a = state.write_gate("sheet_a");
        let b = state.write_gate("sheet_a");
        assert!(Arc::ptr_eq(&a, &b));
        let other = state.write_gate("sheet_b");
        assert!(!Arc::ptr_eq(&a, &other));
    }
}

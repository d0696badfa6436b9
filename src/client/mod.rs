//! Offline-capable client for the action API.
//!
//! A [`SyncSession`] owns the whole client side of the sync contract: the
//! file-backed [`store::LocalStore`], the [`api::ApiClient`] with its
//! read-only guard, and the [`sync::SyncScheduler`] that debounces and
//! serializes saves. One session per running app; there is no module-global
//! state.

/// Remote API client and error taxonomy.
pub mod api;
/// File-backed local store.
pub mod store;
/// Debounced sync scheduler.
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::dao::models::{PlayerEntity, TeamDocumentEntity};
use crate::dto::team::TeamSummary;

use self::api::{ApiClient, ClientError, Transport};
use self::store::LocalStore;
use self::sync::{SyncScheduler, SyncStatus};

/// Construction parameters for a [`SyncSession`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the action API.
    pub base_url: String,
    /// Path of the local store file.
    pub storage_path: PathBuf,
    /// Viewer contexts set this to refuse every write locally.
    pub read_only: bool,
    /// Quiet window before a queued edit is sent.
    pub debounce: Duration,
    /// Bounded save attempts per sync.
    pub max_attempts: u32,
}

impl ClientConfig {
    /// Config with the default debounce and retry bounds.
    pub fn new(base_url: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            storage_path: storage_path.into(),
            read_only: false,
            debounce: sync::DEFAULT_DEBOUNCE,
            max_attempts: sync::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Mark the session read-only (viewer/parent contexts).
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// One client session: local store, API client, and sync scheduler with a
/// clear init/reset lifecycle.
pub struct SyncSession {
    api: Arc<ApiClient>,
    store: Arc<LocalStore>,
    scheduler: SyncScheduler,
}

impl SyncSession {
    /// Open a session with the production HTTP transport.
    pub fn new(config: ClientConfig) -> Self {
        let api = Arc::new(ApiClient::new(config.base_url.clone(), config.read_only));
        Self::assemble(config, api)
    }

    /// Open a session with an explicit transport (tests).
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let api = Arc::new(ApiClient::with_transport(
            config.base_url.clone(),
            config.read_only,
            transport,
        ));
        Self::assemble(config, api)
    }

    fn assemble(config: ClientConfig, api: Arc<ApiClient>) -> Self {
        let store = Arc::new(LocalStore::open(config.storage_path));
        let scheduler = SyncScheduler::new(
            api.clone(),
            store.clone(),
            config.debounce,
            config.max_attempts,
        );
        Self {
            api,
            store,
            scheduler,
        }
    }

    /// The session's API client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The session's local store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The session's sync scheduler.
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Teams listing: fresh cache, then network, then stale cache as offline
    /// fallback.
    pub async fn load_teams(&self) -> Result<Vec<TeamSummary>, ClientError> {
        if let Some(cached) = self.store.teams_list() {
            return Ok(cached);
        }
        match self.api.fetch_teams().await {
            Ok(teams) => {
                self.store.set_teams_list(teams.clone());
                Ok(teams)
            }
            Err(err) if err.is_retryable() => {
                if let Some(stale) = self.store.cached_teams_list() {
                    warn!(error = %err, "network unavailable; serving stale teams list");
                    return Ok(stale);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Team document: fresh cache, then network, then stale cache as offline
    /// fallback.
    pub async fn load_team(
        &self,
        team_id: &str,
        sheet_name: &str,
    ) -> Result<TeamDocumentEntity, ClientError> {
        if self.store.is_fresh(team_id) {
            return Ok(self.store.load_team(team_id));
        }
        match self.api.fetch_team(team_id, sheet_name).await {
            Ok(body) => {
                self.store.put_team(team_id, body.document.clone());
                Ok(body.document)
            }
            Err(err) if err.is_retryable() => match self.store.cached_team(team_id) {
                Some(cached) => {
                    warn!(error = %err, %team_id, "network unavailable; serving cached team");
                    Ok(cached.document)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Apply a local edit optimistically and queue it for sync.
    pub async fn edit_team(
        &self,
        team_id: &str,
        sheet_name: &str,
        mut document: TeamDocumentEntity,
    ) -> Result<(), ClientError> {
        self.api.ensure_writable("saveTeamData")?;
        // Carry the staleness baseline forward; the server assigns the new
        // timestamp on acceptance.
        if let Some(baseline) = self.store.last_modified_of(team_id) {
            document.last_modified = baseline;
        }
        self.store.put_team(team_id, document.clone());
        self.scheduler
            .queue_edit(team_id, sheet_name, document)
            .await;
        Ok(())
    }

    /// Add a player to the roster and queue the save.
    pub async fn add_player(
        &self,
        team_id: &str,
        sheet_name: &str,
        player: PlayerEntity,
    ) -> Result<(), ClientError> {
        self.api.ensure_writable("addPlayer")?;
        let mut document = self.store.load_team(team_id);
        document.players.push(player);
        self.edit_team(team_id, sheet_name, document).await
    }

    /// Remove a player from the roster and queue the save.
    pub async fn delete_player(
        &self,
        team_id: &str,
        sheet_name: &str,
        player_id: &str,
    ) -> Result<(), ClientError> {
        self.api.ensure_writable("deletePlayer")?;
        let mut document = self.store.load_team(team_id);
        document.players.retain(|player| player.id != player_id);
        self.edit_team(team_id, sheet_name, document).await
    }

    /// Exchange a PIN for a token and remember it for gated calls.
    pub async fn unlock_team(&self, team_id: &str, pin: &str) -> Result<(), ClientError> {
        let token = self.api.validate_pin(team_id, pin).await?;
        self.store.set_pin_token(team_id, token);
        Ok(())
    }

    /// Push any pending edit for the team now.
    pub async fn flush(&self, team_id: &str) {
        self.scheduler.flush(team_id).await;
    }

    /// Current sync status for the team.
    pub fn sync_status(&self, team_id: &str) -> SyncStatus {
        self.scheduler.status(team_id).borrow().clone()
    }
}

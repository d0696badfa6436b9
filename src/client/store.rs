//! File-backed local store: the client's persisted copy of team data, PIN
//! tokens, and list caches, surviving restarts.
//!
//! Persistence failures are never fatal; the in-memory copy stays
//! authoritative for the session and failures are only logged.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dao::models::{PlayerLibraryEntity, TeamDocumentEntity};
use crate::dto::team::TeamSummary;

/// How long a cached team document is served without revalidation.
pub const TEAM_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// Cached teams older than this are pruned when the store is opened.
pub const PRUNE_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// One cached team document with its freshness metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTeam {
    /// The cached document.
    pub document: TeamDocumentEntity,
    /// When the cache entry was written (epoch ms).
    pub cached_at: u64,
    /// The server timestamp the entry was cached at; the client's staleness
    /// baseline for the next save.
    pub last_modified: u64,
}

/// Cached teams listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTeamsList {
    /// The listing rows.
    pub teams: Vec<TeamSummary>,
    /// When the cache entry was written (epoch ms).
    pub cached_at: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    teams: HashMap<String, CachedTeam>,
    #[serde(default)]
    pin_tokens: HashMap<String, String>,
    #[serde(default)]
    teams_list: Option<CachedTeamsList>,
    #[serde(default)]
    player_library: Option<PlayerLibraryEntity>,
    #[serde(default)]
    last_saved: Option<String>,
}

/// The client's persisted state, backed by one JSON file.
pub struct LocalStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl LocalStore {
    /// Open the store at `path`, pruning cached teams older than
    /// [`PRUNE_AGE`]. Missing or corrupt files yield an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut state = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PersistedState>(&contents) {
                Ok(state) => state,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "corrupt local store; starting empty");
                    PersistedState::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read local store; starting empty");
                PersistedState::default()
            }
        };

        let now = now_millis();
        let prune_ms = PRUNE_AGE.as_millis() as u64;
        state
            .teams
            .retain(|_, cached| now.saturating_sub(cached.cached_at) <= prune_ms);

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// The last persisted document for a team, or the empty default.
    pub fn load_team(&self, team_id: &str) -> TeamDocumentEntity {
        let state = self.state.lock().expect("local store lock poisoned");
        state
            .teams
            .get(team_id)
            .map(|cached| cached.document.clone())
            .unwrap_or_default()
    }

    /// The cached entry with metadata, when present.
    pub fn cached_team(&self, team_id: &str) -> Option<CachedTeam> {
        let state = self.state.lock().expect("local store lock poisoned");
        state.teams.get(team_id).cloned()
    }

    /// Whether the cached document is fresh enough to serve without a fetch.
    pub fn is_fresh(&self, team_id: &str) -> bool {
        let state = self.state.lock().expect("local store lock poisoned");
        state.teams.get(team_id).is_some_and(|cached| {
            now_millis().saturating_sub(cached.cached_at) < TEAM_CACHE_TTL.as_millis() as u64
        })
    }

    /// Cache a team document and persist. Marks the entry with the document's
    /// own `lastModified` as the staleness baseline.
    pub fn put_team(&self, team_id: &str, document: TeamDocumentEntity) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        let last_modified = document.last_modified;
        state.teams.insert(
            team_id.to_string(),
            CachedTeam {
                document,
                cached_at: now_millis(),
                last_modified,
            },
        );
        self.persist(&mut state);
    }

    /// Update only the staleness baseline after an accepted save.
    pub fn set_last_modified(&self, team_id: &str, last_modified: u64) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        if let Some(cached) = state.teams.get_mut(team_id) {
            cached.last_modified = last_modified;
            cached.document.last_modified = last_modified;
        }
        self.persist(&mut state);
    }

    /// The staleness baseline for a team, when known.
    pub fn last_modified_of(&self, team_id: &str) -> Option<u64> {
        let state = self.state.lock().expect("local store lock poisoned");
        state.teams.get(team_id).map(|cached| cached.last_modified)
    }

    /// Drop a team's cache entry (used when stale data is detected).
    pub fn invalidate_team(&self, team_id: &str) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        state.teams.remove(team_id);
        self.persist(&mut state);
        debug!(%team_id, "team cache invalidated");
    }

    /// Stored PIN token for a team.
    pub fn pin_token(&self, team_id: &str) -> Option<String> {
        let state = self.state.lock().expect("local store lock poisoned");
        state.pin_tokens.get(team_id).cloned()
    }

    /// Store a PIN token.
    pub fn set_pin_token(&self, team_id: &str, token: String) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        state.pin_tokens.insert(team_id.to_string(), token);
        self.persist(&mut state);
    }

    /// Drop a PIN token (after an `AUTH_REQUIRED` response).
    pub fn remove_pin_token(&self, team_id: &str) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        state.pin_tokens.remove(team_id);
        self.persist(&mut state);
    }

    /// Cached teams listing when still fresh.
    pub fn teams_list(&self) -> Option<Vec<TeamSummary>> {
        let state = self.state.lock().expect("local store lock poisoned");
        state.teams_list.as_ref().and_then(|cached| {
            let age = now_millis().saturating_sub(cached.cached_at);
            (age < TEAM_CACHE_TTL.as_millis() as u64).then(|| cached.teams.clone())
        })
    }

    /// Cached teams listing regardless of age, for offline fallback.
    pub fn cached_teams_list(&self) -> Option<Vec<TeamSummary>> {
        let state = self.state.lock().expect("local store lock poisoned");
        state.teams_list.as_ref().map(|cached| cached.teams.clone())
    }

    /// Cache the teams listing.
    pub fn set_teams_list(&self, teams: Vec<TeamSummary>) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        state.teams_list = Some(CachedTeamsList {
            teams,
            cached_at: now_millis(),
        });
        self.persist(&mut state);
    }

    /// Drop the teams listing cache (after create/update team).
    pub fn invalidate_teams_list(&self) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        state.teams_list = None;
        self.persist(&mut state);
        debug!("teams list cache invalidated");
    }

    /// The persisted player library, when present.
    pub fn player_library(&self) -> Option<PlayerLibraryEntity> {
        let state = self.state.lock().expect("local store lock poisoned");
        state.player_library.clone()
    }

    /// Persist the player library.
    pub fn set_player_library(&self, library: PlayerLibraryEntity) {
        let mut state = self.state.lock().expect("local store lock poisoned");
        state.player_library = Some(library);
        self.persist(&mut state);
    }

    fn persist(&self, state: &mut PersistedState) {
        state.last_saved = Some(crate::services::team_service::now_rfc3339());
        match serde_json::to_string(state) {
            Ok(serialized) => {
                if let Err(err) = std::fs::write(&self.path, serialized) {
                    warn!(path = %self.path.display(), error = %err, "failed to persist local store");
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to serialize local store");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("local-store.json"));
        (dir, store)
    }

    #[test]
    fn load_never_fails_on_absent_data() {
        let (_dir, store) = store();
        let document = store.load_team("missing");
        assert!(document.players.is_empty());
        assert!(document.games.is_empty());
        assert_eq!(document.last_modified, 0);
    }

    #[test]
    fn put_then_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-store.json");

        let store = LocalStore::open(&path);
        let mut document = TeamDocumentEntity::default();
        document.last_modified = 42;
        store.put_team("team_1", document.clone());
        store.set_pin_token("team_1", "tok".into());

        let reopened = LocalStore::open(&path);
        assert_eq!(reopened.load_team("team_1"), document);
        assert_eq!(reopened.last_modified_of("team_1"), Some(42));
        assert_eq!(reopened.pin_token("team_1").as_deref(), Some("tok"));
        assert!(reopened.is_fresh("team_1"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = LocalStore::open(&path);
        assert!(store.load_team("team_1").players.is_empty());
    }

    #[test]
    fn unwritable_path_degrades_to_session_state() {
        // Point at a directory that does not exist; writes fail, reads keep
        // serving the in-memory copy.
        let store = LocalStore::open("/nonexistent-dir/local-store.json");
        let mut document = TeamDocumentEntity::default();
        document.last_modified = 7;
        store.put_team("team_1", document.clone());
        assert_eq!(store.load_team("team_1"), document);
    }

    #[test]
    fn invalidate_drops_entry_and_token_survives() {
        let (_dir, store) = store();
        store.put_team("team_1", TeamDocumentEntity::default());
        store.set_pin_token("team_1", "tok".into());

        store.invalidate_team("team_1");
        assert!(store.cached_team("team_1").is_none());
        assert_eq!(store.pin_token("team_1").as_deref(), Some("tok"));
    }
}

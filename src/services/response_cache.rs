//! Short-TTL cache for expensive read responses, with an explicit registry of
//! which mutating actions invalidate which keys.

use std::sync::LazyLock;
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::time::Instant;
use tracing::debug;

/// Cache key holding the serialized `getTeams` response.
pub const TEAMS_LIST_KEY: &str = "getTeamsResponse";

/// Cache key for a team's fixture response.
pub fn fixture_key(team_id: &str) -> String {
    format!("fixtureData::{team_id}")
}

/// Cache key for a team's ladder response.
pub fn ladder_key(team_id: &str) -> String {
    format!("squadiLadder::{team_id}")
}

/// Mutating actions the cache knows about. Every write path names itself here
/// so invalidation is a lookup, not a scattering of `remove` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutatingAction {
    /// `saveTeamData` — changes `playerCount`/`lastModified` in the listing.
    SaveTeamData,
    /// `createTeam` — adds a listing row.
    CreateTeam,
    /// `updateTeam` — changes listing-visible settings.
    UpdateTeam,
    /// `setTeamPIN` — flips `hasPin` in the listing.
    SetTeamPin,
    /// `revokeTeamAccess` — rotates the token; listing itself is unchanged
    /// but cached copies may embed stale `lastModified` ordering.
    RevokeTeamAccess,
    /// `savePlayerLibrary` — the library is not part of the teams listing.
    SavePlayerLibrary,
}

impl MutatingAction {
    /// Every mutating action, for registry-coverage checks.
    pub const ALL: [MutatingAction; 6] = [
        MutatingAction::SaveTeamData,
        MutatingAction::CreateTeam,
        MutatingAction::UpdateTeam,
        MutatingAction::SetTeamPin,
        MutatingAction::RevokeTeamAccess,
        MutatingAction::SavePlayerLibrary,
    ];
}

/// Registry mapping each mutating action to the cache keys it must remove.
/// An empty list is an explicit statement that the action touches nothing
/// listing-visible.
static INVALIDATION_REGISTRY: LazyLock<IndexMap<MutatingAction, Vec<&'static str>>> =
    LazyLock::new(|| {
        IndexMap::from([
            (MutatingAction::SaveTeamData, vec![TEAMS_LIST_KEY]),
            (MutatingAction::CreateTeam, vec![TEAMS_LIST_KEY]),
            (MutatingAction::UpdateTeam, vec![TEAMS_LIST_KEY]),
            (MutatingAction::SetTeamPin, vec![TEAMS_LIST_KEY]),
            (MutatingAction::RevokeTeamAccess, vec![TEAMS_LIST_KEY]),
            (MutatingAction::SavePlayerLibrary, vec![]),
        ])
    });

struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// TTL cache keyed by endpoint, fronting expensive aggregations.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached payload for `key`, or `None` once the TTL elapsed.
    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if Instant::now() >= entry.expires_at {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.payload.clone())
    }

    /// Store `payload` under `key` for `ttl`.
    pub fn put(&self, key: impl Into<String>, payload: String, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop a single key.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every key the registry associates with `action`.
    pub fn invalidate_after(&self, action: MutatingAction) {
        let keys = INVALIDATION_REGISTRY
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for key in keys {
            self.entries.remove(*key);
            debug!(?action, key, "invalidated response cache entry");
        }
    }
}

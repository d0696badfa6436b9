use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Roster-index entry describing one team and its sync metadata.
///
/// This is the unit the teams listing is aggregated from; the actual roster
/// and game payload lives in the [`TeamDocumentEntity`] stored under
/// `sheet_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecordEntity {
    /// Stable identifier for the team.
    #[serde(rename = "teamID")]
    pub team_id: String,
    /// Competition year (e.g. 2026).
    pub year: u16,
    /// Competition season label (e.g. "Autumn").
    pub season: String,
    /// Display name chosen for the team.
    pub name: String,
    /// Storage key under which the team document is persisted.
    pub sheet_name: String,
    /// Ladder endpoint for the competition this team plays in, if configured.
    #[serde(default)]
    pub ladder_api: String,
    /// Fixture/results endpoint for this team's competition, if configured.
    #[serde(default)]
    pub results_api: String,
    /// Archived teams are hidden by default but never erased.
    pub archived: bool,
    /// Precomputed roster size, refreshed on every accepted save.
    pub player_count: usize,
    /// Timestamp (epoch milliseconds) of the last accepted data write.
    pub last_modified: u64,
    /// Optional four-digit access PIN. Never exposed through the API.
    pub pin: Option<String>,
    /// Opaque credential issued after PIN validation; rotated on revoke.
    pub pin_token: Option<String>,
    /// Coach name shown in listings.
    pub coach: String,
}

impl TeamRecordEntity {
    /// Whether writes against this team require a PIN token.
    pub fn pin_protected(&self) -> bool {
        self.pin.as_deref().is_some_and(|pin| pin.len() >= 4)
    }
}

/// Full team payload persisted under a record's `sheet_name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TeamDocumentEntity {
    /// Roster of players.
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
    /// Games with scores and quarter lineups.
    #[serde(default)]
    pub games: Vec<GameEntity>,
    /// Timestamp (epoch milliseconds) assigned by the server on every
    /// accepted write. `0` for a document that has never been saved.
    #[serde(rename = "_lastModified", default)]
    pub last_modified: u64,
}

/// Player entry inside a team document.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Identifier unique within the team.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Link to the cross-team player library, when known.
    pub library_id: Option<String>,
    /// Preferred court positions (e.g. "GA", "WD").
    #[serde(default)]
    pub positions: Vec<String>,
}

/// Game entry inside a team document.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Identifier unique within the team.
    pub id: String,
    /// Opponent team name.
    pub opponent: String,
    /// Scheduled date (ISO 8601 date string).
    pub date: String,
    /// Round label, when the fixture provides one.
    pub round: Option<String>,
    /// Our score, present once the game has been scored.
    pub team_score: Option<u16>,
    /// Opponent score, present once the game has been scored.
    pub opponent_score: Option<u16>,
    /// Whether scoring for this game is closed.
    #[serde(default)]
    pub completed: bool,
    /// Court assignments per quarter, keyed "Q1".."Q4".
    #[serde(default)]
    pub lineup: BTreeMap<String, Vec<LineupSlotEntity>>,
}

/// One filled court position inside a quarter lineup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineupSlotEntity {
    /// Player occupying the position.
    pub player_id: String,
    /// Court position code (e.g. "C", "GK").
    pub position: String,
}

/// Cross-team player registry, stored as a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PlayerLibraryEntity {
    /// Known players across teams and seasons.
    #[serde(default)]
    pub players: Vec<LibraryPlayerEntity>,
}

/// Library entry tracking a player across teams and seasons.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibraryPlayerEntity {
    /// Stable library identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Team IDs this player has appeared in.
    #[serde(default)]
    pub team_ids: Vec<String>,
    /// Free-form notes kept by coaches.
    pub notes: Option<String>,
}

/// Lightweight diagnostics row recorded by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MetricEntity {
    /// RFC 3339 timestamp of when the metric was recorded.
    pub timestamp: String,
    /// Metric name (e.g. "getTeams_totalMs").
    pub metric: String,
    /// Metric value, kept as text as clients send it.
    pub value: String,
    /// Team count or identifier context, free-form.
    pub teams: String,
    /// Extra free-form context.
    pub extra: String,
}

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{TeamDocumentEntity, TeamRecordEntity};
use crate::dto::validation::{validate_pin, validate_sheet_name};

/// One row of the teams listing, as exposed by `getTeams`.
///
/// The stored PIN and token never appear here; clients only learn whether a
/// PIN is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    /// Stable identifier for the team.
    #[serde(rename = "teamID")]
    pub team_id: String,
    /// Competition year.
    pub year: u16,
    /// Competition season label.
    pub season: String,
    /// Display name.
    pub team_name: String,
    /// Storage key for the team document.
    pub sheet_name: String,
    /// Whether the team is archived.
    pub archived: bool,
    /// Precomputed roster size.
    pub player_count: usize,
    /// Ladder endpoint, when configured.
    pub ladder_url: String,
    /// Fixture/results endpoint, when configured.
    pub results_api: String,
    /// Timestamp of the last accepted write; lets clients skip a full fetch
    /// when their cached copy is current.
    pub last_modified: u64,
    /// Whether writes require a PIN token.
    pub has_pin: bool,
    /// Coach name.
    pub coach: String,
}

impl From<TeamRecordEntity> for TeamSummary {
    fn from(record: TeamRecordEntity) -> Self {
        let has_pin = record.pin_protected();
        Self {
            team_id: record.team_id,
            year: record.year,
            season: record.season,
            team_name: record.name,
            sheet_name: record.sheet_name,
            archived: record.archived,
            player_count: record.player_count,
            ladder_url: record.ladder_api,
            results_api: record.results_api,
            last_modified: record.last_modified,
            has_pin,
            coach: record.coach,
        }
    }
}

/// Payload of the `getTeams` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamsPayload {
    /// All roster-index rows in storage order.
    pub teams: Vec<TeamSummary>,
}

/// Payload of the `getTeamData` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamDataPayload {
    /// The team document plus its identifiers.
    #[serde(rename = "teamData")]
    pub team_data: TeamDataBody,
}

/// Team document with the identifiers clients key their caches by.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamDataBody {
    /// Stable identifier for the team.
    #[serde(rename = "teamID")]
    pub team_id: String,
    /// Storage key for the document.
    pub sheet_name: String,
    /// Roster and game payload.
    #[serde(flatten)]
    pub document: TeamDocumentEntity,
}

/// Body of the `saveTeamData` POST action.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveTeamRequest {
    /// Storage key to write under.
    pub sheet_name: String,
    /// Replacement team document.
    pub team_data: TeamDocumentEntity,
    /// The `lastModified` value the client last saw for this team. `None`
    /// skips the staleness check (first save from a fresh client).
    #[serde(default)]
    pub client_last_modified: Option<u64>,
    /// PIN token, required when the team is PIN-protected.
    #[serde(default)]
    pub pin_token: Option<String>,
}

impl Validate for SaveTeamRequest {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();
        if let Err(e) = validate_sheet_name(&self.sheet_name) {
            errors.add("sheetName", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Settings patch accepted by the `updateTeam` action. Absent fields are
/// left untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamSettingsPatch {
    /// New display name.
    pub team_name: Option<String>,
    /// New competition year.
    pub year: Option<u16>,
    /// New season label.
    pub season: Option<String>,
    /// New ladder endpoint.
    pub ladder_url: Option<String>,
    /// New fixture/results endpoint.
    pub results_api: Option<String>,
    /// Archive or unarchive the team.
    pub archived: Option<bool>,
    /// New coach name.
    pub coach: Option<String>,
}

/// Parameters of the `createTeam` action.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    /// Display name for the new team.
    #[validate(length(min = 1, message = "Team name is required"))]
    pub name: String,
    /// Competition year; defaults to the current year.
    #[serde(default)]
    pub year: Option<u16>,
    /// Season label; defaults to "Season 1".
    #[serde(default)]
    pub season: Option<String>,
    /// Coach name.
    #[serde(default)]
    pub coach: Option<String>,
    /// Ladder endpoint.
    #[serde(default)]
    pub ladder_url: Option<String>,
    /// Fixture/results endpoint.
    #[serde(default)]
    pub results_api: Option<String>,
}

/// Parameters of the `setTeamPIN` action. An empty `pin` clears protection.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPinRequest {
    /// Team to change.
    #[serde(rename = "teamID")]
    pub team_id: String,
    /// New four-digit PIN, or empty to remove protection.
    #[serde(default)]
    pub pin: String,
    /// Current token, required when a PIN is already set.
    #[serde(default)]
    pub pin_token: Option<String>,
}

impl Validate for SetPinRequest {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();
        if !self.pin.is_empty() {
            if let Err(e) = validate_pin(&self.pin) {
                errors.add("pin", e);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload of an accepted `saveTeamData`: the server-assigned timestamp the
/// client must use as its next `clientLastModified`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAcceptedPayload {
    /// Timestamp assigned to the accepted write.
    pub last_modified: u64,
}

/// Payload returned by PIN-issuing actions (`validateTeamPIN`, `setTeamPIN`,
/// `revokeTeamAccess`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinTokenPayload {
    /// Freshly issued token, or empty when protection was removed.
    pub pin_token: String,
}

/// Payload of the `getTeamRow` response: the raw record minus credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamRowPayload {
    /// The requested record.
    pub row: TeamRow,
}

/// Record fields safe to expose verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamRow {
    /// Stable identifier for the team.
    #[serde(rename = "teamID")]
    pub team_id: String,
    /// Competition year.
    pub year: u16,
    /// Season label.
    pub season: String,
    /// Display name.
    pub name: String,
    /// Storage key for the team document.
    pub sheet_name: String,
    /// Ladder endpoint.
    pub ladder_api: String,
    /// Fixture/results endpoint.
    pub results_api: String,
    /// Whether the team is archived.
    pub archived: bool,
    /// Precomputed roster size.
    pub player_count: usize,
}

impl From<TeamRecordEntity> for TeamRow {
    fn from(record: TeamRecordEntity) -> Self {
        Self {
            team_id: record.team_id,
            year: record.year,
            season: record.season,
            name: record.name,
            sheet_name: record.sheet_name,
            ladder_api: record.ladder_api,
            results_api: record.results_api,
            archived: record.archived,
            player_count: record.player_count,
        }
    }
}

/// Payload of the `ping` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PingPayload {
    /// Always "pong".
    pub message: String,
    /// Server time, RFC 3339.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TeamRecordEntity {
        TeamRecordEntity {
            team_id: "team_1700000000000".into(),
            year: 2026,
            season: "Autumn".into(),
            name: "U13 Comets".into(),
            sheet_name: "data_team_1700000000000".into(),
            ladder_api: String::new(),
            results_api: String::new(),
            archived: false,
            player_count: 9,
            last_modified: 42,
            pin: Some("4821".into()),
            pin_token: Some("tok".into()),
            coach: "Dana".into(),
        }
    }

    #[test]
    fn summary_hides_pin_but_reports_presence() {
        let summary = TeamSummary::from(record());
        assert!(summary.has_pin);
        let wire = serde_json::to_string(&summary).unwrap();
        assert!(!wire.contains("4821"));
        assert!(!wire.contains("tok"));
    }

    #[test]
    fn save_request_rejects_bad_sheet_name() {
        let request = SaveTeamRequest {
            sheet_name: "has space".into(),
            team_data: TeamDocumentEntity::default(),
            client_last_modified: None,
            pin_token: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn set_pin_allows_empty_pin_for_removal() {
        let request = SetPinRequest {
            team_id: "t".into(),
            pin: String::new(),
            pin_token: Some("tok".into()),
        };
        assert!(request.validate().is_ok());

        let bad = SetPinRequest {
            pin: "12x4".into(),
            ..request
        };
        assert!(bad.validate().is_err());
    }
}

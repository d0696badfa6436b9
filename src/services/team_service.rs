//! Team listing, team data reads, and the guarded save path.
//!
//! The save path is the conflict-detection core: a write is accepted only when
//! the caller's `clientLastModified` is at least the stored value; otherwise
//! the current server document is returned unchanged under the `STALE_DATA`
//! code.

use std::time::{SystemTime, UNIX_EPOCH};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info};
use validator::Validate;

use crate::{
    dao::models::{TeamDocumentEntity, TeamRecordEntity},
    dto::{
        envelope::Envelope,
        team::{
            CreateTeamRequest, PinTokenPayload, PingPayload, SaveAcceptedPayload,
            SaveTeamRequest, TeamDataBody, TeamDataPayload, TeamRow, TeamRowPayload,
            TeamSettingsPatch, TeamSummary, TeamsPayload,
        },
    },
    error::ServiceError,
    services::{
        pin::{generate_pin_token, token_matches},
        response_cache::{MutatingAction, TEAMS_LIST_KEY},
    },
    state::SharedState,
};

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Current wall-clock time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Liveness probe payload.
pub fn ping() -> PingPayload {
    PingPayload {
        message: "pong".into(),
        timestamp: now_rfc3339(),
    }
}

/// Serialized `getTeams` envelope, served from the response cache when fresh.
///
/// Returns the raw JSON string so cache hits are byte-identical to the
/// response that populated them.
pub async fn list_teams(state: &SharedState) -> Result<String, ServiceError> {
    let cache = state.response_cache();
    if let Some(cached) = cache.get(TEAMS_LIST_KEY) {
        debug!("getTeams served from response cache");
        return Ok(cached);
    }

    let store = state.require_team_store().await?;
    let records = store.list_records().await?;
    let teams = records.into_iter().map(TeamSummary::from).collect();

    let payload = serde_json::to_string(&Envelope::ok(TeamsPayload { teams }))
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    cache.put(
        TEAMS_LIST_KEY,
        payload.clone(),
        state.config().teams_cache_ttl,
    );
    Ok(payload)
}

/// Load a team document by its storage key.
pub async fn get_team_data(
    state: &SharedState,
    team_id: String,
    sheet_name: String,
) -> Result<TeamDataPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let document = match store.load_document(sheet_name.clone()).await? {
        Some(document) => document,
        None => {
            // A record without a document means a freshly created team: serve
            // the empty shape rather than failing.
            let records = store.list_records().await?;
            if records.iter().any(|record| record.sheet_name == sheet_name) {
                TeamDocumentEntity::default()
            } else {
                return Err(ServiceError::NotFound(format!(
                    "team data sheet not found: {sheet_name}"
                )));
            }
        }
    };

    Ok(TeamDataPayload {
        team_data: TeamDataBody {
            team_id,
            sheet_name,
            document,
        },
    })
}

/// Persist a team document if the caller's snapshot is current. Returns the
/// server-assigned `lastModified` so clients can keep their staleness
/// baseline current.
pub async fn save_team_data(
    state: &SharedState,
    request: SaveTeamRequest,
) -> Result<SaveAcceptedPayload, ServiceError> {
    request.validate()?;
    let store = state.require_team_store().await?;

    let record = find_record_by_sheet(state, &request.sheet_name)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "team data sheet not found: {}",
                request.sheet_name
            ))
        })?;

    if record.pin_protected()
        && !token_matches(record.pin_token.as_deref(), request.pin_token.as_deref())
    {
        return Err(ServiceError::AuthRequired);
    }

    // The store has no conditional write; serialize compare-then-write per
    // sheet so two local writers cannot interleave between the read and the
    // put.
    let gate = state.write_gate(&request.sheet_name);
    let _guard = gate.lock().await;

    let stored = store
        .load_document(request.sheet_name.clone())
        .await?
        .unwrap_or_default();
    let server_last_modified = stored.last_modified;

    if let Some(client_last_modified) = request.client_last_modified {
        if server_last_modified > client_last_modified {
            debug!(
                sheet = %request.sheet_name,
                server_last_modified,
                client_last_modified,
                "rejecting stale save"
            );
            return Err(ServiceError::Stale {
                server_last_modified,
                snapshot: stored,
            });
        }
    }

    let mut document = request.team_data;
    document.last_modified = now_millis().max(server_last_modified + 1);
    let accepted_last_modified = document.last_modified;
    let player_count = document.players.len();

    store
        .store_document(request.sheet_name.clone(), document)
        .await?;

    let mut record = record;
    record.player_count = player_count;
    record.last_modified = accepted_last_modified;
    store.update_record(record).await?;

    state
        .response_cache()
        .invalidate_after(MutatingAction::SaveTeamData);
    info!(
        sheet = %request.sheet_name,
        last_modified = accepted_last_modified,
        player_count,
        "team data saved"
    );
    Ok(SaveAcceptedPayload {
        last_modified: accepted_last_modified,
    })
}

/// Create a team: roster-index record plus an empty document.
pub async fn create_team(
    state: &SharedState,
    request: CreateTeamRequest,
) -> Result<TeamsPayload, ServiceError> {
    request.validate()?;
    let store = state.require_team_store().await?;

    let team_id = format!("team_{}", now_millis());
    let sheet_name = format!("data_{team_id}");
    let record = TeamRecordEntity {
        team_id,
        year: request
            .year
            .unwrap_or_else(|| OffsetDateTime::now_utc().year() as u16),
        season: request.season.unwrap_or_else(|| "Season 1".into()),
        name: request.name,
        sheet_name: sheet_name.clone(),
        ladder_api: request.ladder_url.unwrap_or_default(),
        results_api: request.results_api.unwrap_or_default(),
        archived: false,
        player_count: 0,
        last_modified: 0,
        pin: None,
        pin_token: None,
        coach: request.coach.unwrap_or_default(),
    };

    store.append_record(record).await?;
    store
        .store_document(sheet_name, TeamDocumentEntity::default())
        .await?;
    state
        .response_cache()
        .invalidate_after(MutatingAction::CreateTeam);

    let teams = store
        .list_records()
        .await?
        .into_iter()
        .map(TeamSummary::from)
        .collect();
    Ok(TeamsPayload { teams })
}

/// Apply a settings patch to a team record.
pub async fn update_team_settings(
    state: &SharedState,
    team_id: String,
    patch: TeamSettingsPatch,
    pin_token: Option<String>,
) -> Result<(), ServiceError> {
    let store = state.require_team_store().await?;
    let mut record = store
        .find_record(team_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team not found: {team_id}")))?;

    if record.pin_protected() && !token_matches(record.pin_token.as_deref(), pin_token.as_deref())
    {
        return Err(ServiceError::AuthRequired);
    }

    if let Some(name) = patch.team_name {
        record.name = name;
    }
    if let Some(year) = patch.year {
        record.year = year;
    }
    if let Some(season) = patch.season {
        record.season = season;
    }
    if let Some(ladder_url) = patch.ladder_url {
        record.ladder_api = ladder_url;
    }
    if let Some(results_api) = patch.results_api {
        record.results_api = results_api;
    }
    if let Some(archived) = patch.archived {
        record.archived = archived;
    }
    if let Some(coach) = patch.coach {
        record.coach = coach;
    }

    store.update_record(record).await?;
    state
        .response_cache()
        .invalidate_after(MutatingAction::UpdateTeam);
    Ok(())
}

/// Exchange a correct PIN for the team's current token.
pub async fn validate_team_pin(
    state: &SharedState,
    team_id: String,
    pin: String,
) -> Result<PinTokenPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let record = store
        .find_record(team_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team not found: {team_id}")))?;

    let Some(stored_pin) = record.pin.as_deref() else {
        return Err(ServiceError::InvalidInput("Team has no PIN set".into()));
    };

    let master_matches = state
        .config()
        .master_pin
        .as_deref()
        .is_some_and(|master| master == pin);
    if pin != stored_pin && !master_matches {
        return Err(ServiceError::InvalidInput("Invalid PIN".into()));
    }

    Ok(PinTokenPayload {
        pin_token: record.pin_token.unwrap_or_default(),
    })
}

/// Set, change, or remove a team's PIN. Returns the fresh token (empty when
/// protection was removed).
pub async fn set_team_pin(
    state: &SharedState,
    team_id: String,
    pin: String,
    pin_token: Option<String>,
) -> Result<PinTokenPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let mut record = store
        .find_record(team_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team not found: {team_id}")))?;

    // Changing an existing PIN requires the current token.
    if record.pin.is_some() && !token_matches(record.pin_token.as_deref(), pin_token.as_deref()) {
        return Err(ServiceError::AuthRequired);
    }

    let issued = if pin.is_empty() {
        record.pin = None;
        record.pin_token = None;
        String::new()
    } else {
        let token = generate_pin_token();
        record.pin = Some(pin);
        record.pin_token = Some(token.clone());
        token
    };

    store.update_record(record).await?;
    state
        .response_cache()
        .invalidate_after(MutatingAction::SetTeamPin);
    Ok(PinTokenPayload { pin_token: issued })
}

/// Rotate a team's token, signing every other device out.
pub async fn revoke_team_access(
    state: &SharedState,
    team_id: String,
    pin_token: String,
) -> Result<PinTokenPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let mut record = store
        .find_record(team_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team not found: {team_id}")))?;

    if record.pin.is_none() {
        return Err(ServiceError::InvalidInput("Team has no PIN set".into()));
    }
    if !token_matches(record.pin_token.as_deref(), Some(pin_token.as_str())) {
        return Err(ServiceError::AuthRequired);
    }

    let token = generate_pin_token();
    record.pin_token = Some(token.clone());
    store.update_record(record).await?;
    state
        .response_cache()
        .invalidate_after(MutatingAction::RevokeTeamAccess);
    Ok(PinTokenPayload { pin_token: token })
}

/// Raw record lookup for a team, credentials stripped.
pub async fn get_team_row(
    state: &SharedState,
    team_id: String,
) -> Result<TeamRowPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let record = store
        .find_record(team_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team not found: {team_id}")))?;
    Ok(TeamRowPayload {
        row: TeamRow::from(record),
    })
}

pub(crate) async fn find_record_by_sheet(
    state: &SharedState,
    sheet_name: &str,
) -> Result<Option<TeamRecordEntity>, ServiceError> {
    let store = state.require_team_store().await?;
    let records = store.list_records().await?;
    Ok(records
        .into_iter()
        .find(|record| record.sheet_name == sheet_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::dao::models::PlayerEntity;
    use crate::dao::team_store::memory::MemoryTeamStore;
    use crate::services::insights_service::StaticInsightsGenerator;
    use crate::state::AppState;

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default(), Arc::new(StaticInsightsGenerator));
        state
            .install_team_store(Arc::new(MemoryTeamStore::new()))
            .await;
        state
    }

    async fn seeded_team(state: &SharedState) -> (String, String) {
        let teams = create_team(
            state,
            CreateTeamRequest {
                name: "U13 Comets".into(),
                year: Some(2026),
                season: Some("Autumn".into()),
                coach: Some("Dana".into()),
                ladder_url: None,
                results_api: None,
            },
        )
        .await
        .unwrap();
        let team = &teams.teams[0];
        (team.team_id.clone(), team.sheet_name.clone())
    }

    fn document_with_players(names: &[&str]) -> TeamDocumentEntity {
        TeamDocumentEntity {
            players: names
                .iter()
                .enumerate()
                .map(|(i, name)| PlayerEntity {
                    id: format!("p{i}"),
                    name: (*name).into(),
                    library_id: None,
                    positions: Vec::new(),
                })
                .collect(),
            ..TeamDocumentEntity::default()
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let state = state_with_store().await;
        let (team_id, sheet) = seeded_team(&state).await;

        let document = document_with_players(&["Asha", "Billie"]);
        save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet.clone(),
                team_data: document.clone(),
                client_last_modified: None,
                pin_token: None,
            },
        )
        .await
        .unwrap();

        let loaded = get_team_data(&state, team_id, sheet).await.unwrap();
        assert_eq!(loaded.team_data.document.players, document.players);
        assert_eq!(loaded.team_data.document.games, document.games);
        assert!(loaded.team_data.document.last_modified > 0);
    }

    #[tokio::test]
    async fn stale_save_is_rejected_and_payload_unchanged() {
        let state = state_with_store().await;
        let (team_id, sheet) = seeded_team(&state).await;

        save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet.clone(),
                team_data: document_with_players(&["Asha"]),
                client_last_modified: None,
                pin_token: None,
            },
        )
        .await
        .unwrap();
        let current = get_team_data(&state, team_id.clone(), sheet.clone())
            .await
            .unwrap()
            .team_data
            .document;

        // A writer that last saw lastModified=1 is behind the accepted save.
        let err = save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet.clone(),
                team_data: document_with_players(&["Zoe"]),
                client_last_modified: Some(1),
                pin_token: None,
            },
        )
        .await
        .unwrap_err();

        match err {
            ServiceError::Stale {
                server_last_modified,
                snapshot,
            } => {
                assert_eq!(server_last_modified, current.last_modified);
                assert_eq!(snapshot, current);
            }
            other => panic!("expected stale rejection, got {other:?}"),
        }

        let after = get_team_data(&state, team_id, sheet)
            .await
            .unwrap()
            .team_data
            .document;
        assert_eq!(after, current);
    }

    #[tokio::test]
    async fn accepted_saves_strictly_increase_last_modified() {
        let state = state_with_store().await;
        let (_, sheet) = seeded_team(&state).await;

        let mut previous = 0;
        for round in 0..3 {
            save_team_data(
                &state,
                SaveTeamRequest {
                    sheet_name: sheet.clone(),
                    team_data: document_with_players(&["Asha"]),
                    client_last_modified: Some(previous),
                    pin_token: None,
                },
            )
            .await
            .unwrap();
            let store = state.require_team_store().await.unwrap();
            let stored = store.load_document(sheet.clone()).await.unwrap().unwrap();
            assert!(
                stored.last_modified > previous,
                "round {round}: {} not > {previous}",
                stored.last_modified
            );
            previous = stored.last_modified;
        }
    }

    #[tokio::test]
    async fn matching_client_timestamp_is_accepted() {
        let state = state_with_store().await;
        let (_, sheet) = seeded_team(&state).await;

        save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet.clone(),
                team_data: document_with_players(&["Asha"]),
                client_last_modified: None,
                pin_token: None,
            },
        )
        .await
        .unwrap();
        let store = state.require_team_store().await.unwrap();
        let current = store.load_document(sheet.clone()).await.unwrap().unwrap();

        // Equal timestamps mean the client has seen the latest write.
        save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet,
                team_data: document_with_players(&["Asha", "Billie"]),
                client_last_modified: Some(current.last_modified),
                pin_token: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn pin_protected_save_requires_token() {
        let state = state_with_store().await;
        let (team_id, sheet) = seeded_team(&state).await;

        let issued = set_team_pin(&state, team_id.clone(), "4821".into(), None)
            .await
            .unwrap();

        let err = save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet.clone(),
                team_data: document_with_players(&["Asha"]),
                client_last_modified: None,
                pin_token: Some("wrong".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::AuthRequired));

        save_team_data(
            &state,
            SaveTeamRequest {
                sheet_name: sheet,
                team_data: document_with_players(&["Asha"]),
                client_last_modified: None,
                pin_token: Some(issued.pin_token),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn teams_cache_hits_are_byte_identical_and_invalidated_by_pin_set() {
        let state = state_with_store().await;
        let (team_id, _) = seeded_team(&state).await;

        let first = list_teams(&state).await.unwrap();
        let second = list_teams(&state).await.unwrap();
        assert_eq!(first, second);
        assert!(first.contains(r#""hasPin":false"#));

        set_team_pin(&state, team_id, "4821".into(), None)
            .await
            .unwrap();

        let third = list_teams(&state).await.unwrap();
        assert_ne!(first, third);
        assert!(third.contains(r#""hasPin":true"#));
    }

    #[tokio::test]
    async fn validate_pin_exchanges_for_token() {
        let state = state_with_store().await;
        let (team_id, _) = seeded_team(&state).await;

        let issued = set_team_pin(&state, team_id.clone(), "4821".into(), None)
            .await
            .unwrap();

        let exchanged = validate_team_pin(&state, team_id.clone(), "4821".into())
            .await
            .unwrap();
        assert_eq!(exchanged.pin_token, issued.pin_token);

        let err = validate_team_pin(&state, team_id, "0000".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn revoke_rotates_token() {
        let state = state_with_store().await;
        let (team_id, _) = seeded_team(&state).await;

        let issued = set_team_pin(&state, team_id.clone(), "4821".into(), None)
            .await
            .unwrap();
        let rotated = revoke_team_access(&state, team_id.clone(), issued.pin_token.clone())
            .await
            .unwrap();
        assert_ne!(rotated.pin_token, issued.pin_token);

        // Old token no longer revokes.
        let err = revoke_team_access(&state, team_id, issued.pin_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthRequired));
    }

    #[tokio::test]
    async fn archive_flag_updates_without_deleting() {
        let state = state_with_store().await;
        let (team_id, sheet) = seeded_team(&state).await;

        update_team_settings(
            &state,
            team_id.clone(),
            TeamSettingsPatch {
                archived: Some(true),
                ..TeamSettingsPatch::default()
            },
            None,
        )
        .await
        .unwrap();

        let row = get_team_row(&state, team_id.clone()).await.unwrap();
        assert!(row.row.archived);
        // Data stays loadable after archiving.
        get_team_data(&state, team_id, sheet).await.unwrap();
    }
}

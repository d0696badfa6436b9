//! The single `/api` action surface.
//!
//! Read actions arrive as `GET /api?api=true&action=<name>&...`; write actions
//! arrive as `POST /api` with an `{action, ...}` JSON body, plus a handful of
//! legacy writes tunneled over GET. Every response carries the
//! `{success, ...}` envelope.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::{
    dao::models::{PlayerLibraryEntity, TeamDocumentEntity},
    dto::{
        envelope::{Ack, Envelope},
        team::{CreateTeamRequest, SaveTeamRequest, SetPinRequest, TeamSettingsPatch},
    },
    dto::diagnostics::LogMetricRequest,
    error::AppError,
    services::{
        diagnostics_service::{self, DEFAULT_DIAGNOSTICS_LIMIT},
        fixture_service, insights_service, library_service, team_service,
    },
    state::SharedState,
};

/// Configure the `/api` action route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api", get(api_read).post(api_write))
}

/// Dispatch a read (or legacy GET write) action.
#[utoipa::path(
    get,
    path = "/api",
    tag = "actions",
    params(
        ("api" = String, Query, description = "Must be `true`; marks the request as an API call"),
        ("action" = String, Query, description = "Action name, e.g. `getTeams`"),
    ),
    responses((status = 200, description = "Action-specific envelope payload"))
)]
pub async fn api_read(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    if params.get("api").map(String::as_str) != Some("true") {
        return Err(AppError::BadRequest("api=true is required".into()));
    }
    let action = params.get("action").cloned().unwrap_or_default();

    match action.as_str() {
        "ping" => Ok(envelope(team_service::ping())),
        "getTeams" => Ok(raw_json(team_service::list_teams(&state).await?)),
        "getTeamData" => {
            let sheet_name = required(&params, "sheetName")?;
            let team_id = params.get("teamID").cloned().unwrap_or_default();
            Ok(envelope(
                team_service::get_team_data(&state, team_id, sheet_name).await?,
            ))
        }
        "getPlayerLibrary" => Ok(envelope(library_service::load_library(&state).await?)),
        "getTeamRow" => {
            let team_id = required(&params, "teamID")?;
            Ok(envelope(team_service::get_team_row(&state, team_id).await?))
        }
        "getDiagnostics" => {
            let limit = params
                .get("limit")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_DIAGNOSTICS_LIMIT);
            Ok(envelope(
                diagnostics_service::get_diagnostics(&state, limit).await?,
            ))
        }
        "validateTeamPIN" => {
            let (team_id, pin) = match (params.get("teamID"), params.get("pin")) {
                (Some(team_id), Some(pin)) if !team_id.is_empty() && !pin.is_empty() => {
                    (team_id.clone(), pin.clone())
                }
                _ => return Err(AppError::BadRequest("teamID and pin are required".into())),
            };
            Ok(envelope(
                team_service::validate_team_pin(&state, team_id, pin).await?,
            ))
        }
        "getFixtureData" => {
            let team_id = required(&params, "teamID")?;
            Ok(raw_json(fixture_service::fixture_data(&state, team_id).await?))
        }
        "getSquadiLadder" => {
            let team_id = required(&params, "teamID")?;
            Ok(raw_json(
                fixture_service::squadi_ladder(&state, team_id).await?,
            ))
        }
        "updateTeam" => {
            let team_id = required(&params, "teamID")?;
            let settings_json = params.get("settings").cloned().unwrap_or_else(|| "{}".into());
            let patch: TeamSettingsPatch = serde_json::from_str(&settings_json)
                .map_err(|err| AppError::BadRequest(format!("invalid settings JSON: {err}")))?;
            let pin_token = params.get("pinToken").cloned();
            team_service::update_team_settings(&state, team_id, patch, pin_token).await?;
            Ok(envelope(Ack::default()))
        }
        "setTeamPIN" => {
            let request = SetPinRequest {
                team_id: required(&params, "teamID")?,
                pin: params.get("pin").cloned().unwrap_or_default(),
                pin_token: params.get("pinToken").cloned(),
            };
            request.validate()?;
            Ok(envelope(
                team_service::set_team_pin(&state, request.team_id, request.pin, request.pin_token)
                    .await?,
            ))
        }
        "revokeTeamAccess" => {
            let (team_id, pin_token) = match (params.get("teamID"), params.get("pinToken")) {
                (Some(team_id), Some(token)) if !team_id.is_empty() && !token.is_empty() => {
                    (team_id.clone(), token.clone())
                }
                _ => {
                    return Err(AppError::BadRequest(
                        "teamID and pinToken are required".into(),
                    ));
                }
            };
            Ok(envelope(
                team_service::revoke_team_access(&state, team_id, pin_token).await?,
            ))
        }
        "createTeam" => {
            let request = CreateTeamRequest {
                name: params.get("name").cloned().unwrap_or_default(),
                year: params.get("year").and_then(|value| value.parse().ok()),
                season: params.get("season").cloned(),
                coach: params.get("coach").cloned(),
                ladder_url: params.get("ladderUrl").cloned(),
                results_api: params.get("resultsApi").cloned(),
            };
            Ok(envelope(team_service::create_team(&state, request).await?))
        }
        "logClientMetric" => {
            let request = LogMetricRequest {
                name: params.get("name").cloned().unwrap_or_default(),
                value: params.get("value").cloned().unwrap_or_default(),
                teams: params.get("teams").cloned().unwrap_or_default(),
                extra: params.get("extra").cloned().unwrap_or_default(),
            };
            diagnostics_service::log_metric(&state, request).await?;
            Ok(envelope(Ack::default()))
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {other}"))),
    }
}

/// Dispatch a write action carried in a JSON body.
#[utoipa::path(
    post,
    path = "/api",
    tag = "actions",
    responses((status = 200, description = "Action-specific envelope payload"))
)]
pub async fn api_write(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match action.as_str() {
        "saveTeamData" => {
            let sheet_name = body
                .get("sheetName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let team_value = body.get("teamData").filter(|value| !value.is_null());
            let Some(team_value) = team_value else {
                return Err(AppError::BadRequest(
                    "sheetName and teamData are required".into(),
                ));
            };
            if sheet_name.is_empty() {
                return Err(AppError::BadRequest(
                    "sheetName and teamData are required".into(),
                ));
            }
            let team_data: TeamDocumentEntity = parse_embedded(team_value)?;
            let request = SaveTeamRequest {
                sheet_name,
                team_data,
                client_last_modified: body.get("clientLastModified").and_then(Value::as_u64),
                pin_token: body
                    .get("pinToken")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
            Ok(envelope(team_service::save_team_data(&state, request).await?))
        }
        "savePlayerLibrary" => {
            let Some(library_value) = body.get("playerLibrary").filter(|value| !value.is_null())
            else {
                return Err(AppError::BadRequest("playerLibrary is required".into()));
            };
            let library: PlayerLibraryEntity = parse_embedded(library_value)?;
            library_service::save_library(&state, library).await?;
            Ok(envelope(Ack::default()))
        }
        "getAIInsights" => {
            let analytics = required_value(&body, "analytics", "analytics data is required")?;
            Ok(envelope(
                insights_service::team_insights(&state, analytics).await?,
            ))
        }
        "getGameAIInsights" => {
            let game_data = required_value(&body, "gameData", "gameData is required")?;
            Ok(envelope(
                insights_service::game_insights(&state, game_data).await?,
            ))
        }
        "getPlayerAIInsights" => {
            let player_data = required_value(&body, "playerData", "playerData is required")?;
            Ok(envelope(
                insights_service::player_insights(&state, player_data).await?,
            ))
        }
        "getTrainingFocus" => {
            let training_data = required_value(&body, "trainingData", "trainingData is required")?;
            Ok(envelope(
                insights_service::training_focus(&state, training_data).await?,
            ))
        }
        other => Err(AppError::BadRequest(format!(
            "Unknown POST action: {other}"
        ))),
    }
}

fn envelope<T: Serialize>(payload: T) -> Response {
    Json(Envelope::ok(payload)).into_response()
}

/// Respond with an already-serialized envelope (cache hits must stay
/// byte-identical to the response that populated them).
fn raw_json(payload: String) -> Response {
    ([(CONTENT_TYPE, "application/json")], payload).into_response()
}

fn required(params: &HashMap<String, String>, key: &str) -> Result<String, AppError> {
    params
        .get(key)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| AppError::BadRequest(format!("{key} is required")))
}

fn required_value(body: &Value, key: &str, message: &str) -> Result<Value, AppError> {
    match body.get(key) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(AppError::BadRequest(message.into())),
    }
}

/// Payloads may arrive as objects or as stringified JSON (legacy clients send
/// the latter to sidestep query-string limits).
fn parse_embedded<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, AppError> {
    let result = match value {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    };
    result.map_err(|err| AppError::BadRequest(format!("invalid payload: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::dao::team_store::memory::MemoryTeamStore;
    use crate::services::insights_service::StaticInsightsGenerator;
    use crate::services::team_service;
    use crate::state::AppState;
    use serde_json::json;

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default(), Arc::new(StaticInsightsGenerator));
        state
            .install_team_store(Arc::new(MemoryTeamStore::new()))
            .await;
        state
    }

    fn read_params(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn read_requires_api_flag() {
        let state = state_with_store().await;
        let err = api_read(State(state), read_params(&[("action", "ping")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unknown_actions_are_rejected() {
        let state = state_with_store().await;
        let err = api_read(
            State(state.clone()),
            read_params(&[("api", "true"), ("action", "nope")]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = api_write(State(state), Json(json!({ "action": "nope" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn save_requires_sheet_and_payload() {
        let state = state_with_store().await;
        let err = api_write(
            State(state),
            Json(json!({ "action": "saveTeamData", "sheetName": "s" })),
        )
        .await
        .unwrap_err();
        match err {
            AppError::BadRequest(message) => {
                assert_eq!(message, "sheetName and teamData are required")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_accepts_stringified_team_data() {
        let state = state_with_store().await;
        let teams = team_service::create_team(
            &state,
            CreateTeamRequest {
                name: "U13 Comets".into(),
                year: None,
                season: None,
                coach: None,
                ladder_url: None,
                results_api: None,
            },
        )
        .await
        .unwrap();
        let sheet = teams.teams[0].sheet_name.clone();

        let body = json!({
            "action": "saveTeamData",
            "sheetName": sheet,
            "teamData": "{\"players\":[],\"games\":[]}",
        });
        api_write(State(state), Json(body)).await.unwrap();
    }

    #[tokio::test]
    async fn stale_write_maps_to_conflict_envelope() {
        let state = state_with_store().await;
        let teams = team_service::create_team(
            &state,
            CreateTeamRequest {
                name: "U13 Comets".into(),
                year: None,
                season: None,
                coach: None,
                ladder_url: None,
                results_api: None,
            },
        )
        .await
        .unwrap();
        let sheet = teams.teams[0].sheet_name.clone();

        let save = |lm: Option<u64>| {
            json!({
                "action": "saveTeamData",
                "sheetName": sheet.clone(),
                "teamData": { "players": [], "games": [] },
                "clientLastModified": lm,
            })
        };

        api_write(State(state.clone()), Json(save(None))).await.unwrap();
        let err = api_write(State(state), Json(save(Some(1)))).await.unwrap_err();
        assert!(matches!(err, AppError::Stale { .. }));
    }

    #[tokio::test]
    async fn insights_pass_through_answers() {
        let state = state_with_store().await;
        let response = api_write(
            State(state),
            Json(json!({ "action": "getAIInsights", "analytics": { "games": 4 } })),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}

//! Pass-through to the external competition API for fixtures and ladder
//! standings, cached server-side well beyond the teams-list TTL because the
//! upstream updates at most a few times per day.

use serde::Deserialize;
use tracing::debug;

use crate::{
    dto::{
        envelope::Envelope,
        fixture::{
            FixtureMatch, FixturePayload, FixtureRound, FixtureTeam, LadderPayload, LadderRow,
        },
    },
    error::ServiceError,
    services::response_cache::{fixture_key, ladder_key},
    state::SharedState,
};

/// Store setting holding the competition API bearer token.
pub const AUTH_TOKEN_SETTING: &str = "squadiAuthToken";

const TOKEN_PLACEHOLDER: &str = "PASTE_NEW_TOKEN_HERE";

/// Serialized `getFixtureData` envelope for a team, served from cache when
/// fresh.
pub async fn fixture_data(state: &SharedState, team_id: String) -> Result<String, ServiceError> {
    let cache_key = fixture_key(&team_id);
    if let Some(cached) = state.response_cache().get(&cache_key) {
        debug!(%team_id, "fixture data served from response cache");
        return Ok(cached);
    }

    let record = require_record(state, &team_id).await?;
    if record.results_api.is_empty() {
        return Err(ServiceError::InvalidInput(
            "team has no results API configured".into(),
        ));
    }

    let body = fetch_upstream(state, &record.results_api).await?;
    let upstream: UpstreamFixtures = serde_json::from_str(&body)
        .map_err(|err| ServiceError::Upstream(format!("fixture response malformed: {err}")))?;

    let mut rounds: Vec<FixtureRound> = upstream
        .rounds
        .into_iter()
        .map(round_from_upstream)
        .collect();
    rounds.sort_by_key(|round| round_number(&round.name));

    let payload = serde_json::to_string(&Envelope::ok(FixturePayload { fixtures: rounds }))
        .map_err(|err| ServiceError::Upstream(err.to_string()))?;
    state
        .response_cache()
        .put(cache_key, payload.clone(), state.config().fixture_cache_ttl);
    Ok(payload)
}

/// Serialized `getSquadiLadder` envelope for a team, served from cache when
/// fresh.
pub async fn squadi_ladder(state: &SharedState, team_id: String) -> Result<String, ServiceError> {
    let cache_key = ladder_key(&team_id);
    if let Some(cached) = state.response_cache().get(&cache_key) {
        debug!(%team_id, "ladder served from response cache");
        return Ok(cached);
    }

    let record = require_record(state, &team_id).await?;
    if record.ladder_api.is_empty() {
        return Err(ServiceError::InvalidInput(
            "team has no ladder API configured".into(),
        ));
    }

    let body = fetch_upstream(state, &record.ladder_api).await?;
    let upstream: UpstreamLadder = serde_json::from_str(&body)
        .map_err(|err| ServiceError::Upstream(format!("ladder response malformed: {err}")))?;

    let ladder = upstream
        .ladders
        .into_iter()
        .map(ladder_row_from_upstream)
        .collect();

    let payload = serde_json::to_string(&Envelope::ok(LadderPayload { ladder }))
        .map_err(|err| ServiceError::Upstream(err.to_string()))?;
    state
        .response_cache()
        .put(cache_key, payload.clone(), state.config().ladder_cache_ttl);
    Ok(payload)
}

async fn require_record(
    state: &SharedState,
    team_id: &str,
) -> Result<crate::dao::models::TeamRecordEntity, ServiceError> {
    let store = state.require_team_store().await?;
    store
        .find_record(team_id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team not found: {team_id}")))
}

async fn fetch_upstream(state: &SharedState, url: &str) -> Result<String, ServiceError> {
    let store = state.require_team_store().await?;
    let token = store
        .load_setting(AUTH_TOKEN_SETTING.to_string())
        .await?
        .filter(|token| !token.is_empty() && token != TOKEN_PLACEHOLDER)
        .ok_or_else(|| {
            ServiceError::Upstream("competition API token missing; set it via admin".into())
        })?;

    let response = state
        .http_client()
        .get(url)
        .header("Authorization", token)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|err| ServiceError::Upstream(err.to_string()))?;

    if !response.status().is_success() {
        return Err(ServiceError::Upstream(format!(
            "external API error: {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|err| ServiceError::Upstream(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct UpstreamFixtures {
    #[serde(default)]
    rounds: Vec<UpstreamRound>,
}

#[derive(Debug, Deserialize)]
struct UpstreamRound {
    name: String,
    #[serde(default)]
    matches: Vec<UpstreamMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamMatch {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    start_time: String,
    team1: UpstreamTeam,
    team2: UpstreamTeam,
    #[serde(default)]
    team1_score: u16,
    #[serde(default)]
    team2_score: u16,
    #[serde(default)]
    match_status: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamTeam {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamLadder {
    #[serde(default)]
    ladders: Vec<UpstreamLadderRow>,
}

#[derive(Debug, Deserialize)]
struct UpstreamLadderRow {
    #[serde(default)]
    rk: u8,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "P")]
    played: u16,
    #[serde(default, rename = "W")]
    wins: u16,
    #[serde(default, rename = "L")]
    losses: u16,
    #[serde(default, rename = "D")]
    draws: u16,
    #[serde(default, rename = "F")]
    goals_for: u32,
    #[serde(default, rename = "A")]
    goals_against: u32,
    #[serde(default, rename = "PTS")]
    points: u16,
}

fn round_from_upstream(round: UpstreamRound) -> FixtureRound {
    let matches = round
        .matches
        .into_iter()
        .enumerate()
        .map(|(index, m)| {
            let id = match m.id {
                Some(serde_json::Value::String(id)) => id,
                Some(serde_json::Value::Number(id)) => id.to_string(),
                _ => format!("match_{index}"),
            };
            FixtureMatch {
                id,
                start_time: m.start_time,
                team1: FixtureTeam { name: m.team1.name },
                team2: FixtureTeam { name: m.team2.name },
                team1_score: m.team1_score,
                team2_score: m.team2_score,
                team1_result_id: result_id(m.team1_score, m.team2_score),
                team2_result_id: result_id(m.team2_score, m.team1_score),
                match_status: m.match_status,
            }
        })
        .collect();
    FixtureRound {
        name: round.name,
        matches,
    }
}

fn ladder_row_from_upstream(row: UpstreamLadderRow) -> LadderRow {
    let goal_average = if row.goals_against != 0 {
        f64::from(row.goals_for) / f64::from(row.goals_against) * 100.0
    } else {
        0.0
    };
    LadderRow {
        rk: row.rk,
        name: row.name,
        played: row.played,
        wins: row.wins,
        losses: row.losses,
        draws: row.draws,
        goals_for: row.goals_for,
        goals_against: row.goals_against,
        goal_average,
        points: row.points,
    }
}

/// 1 = win, 2 = loss, 3 = draw.
fn result_id(own: u16, opponent: u16) -> u8 {
    use std::cmp::Ordering;
    match own.cmp(&opponent) {
        Ordering::Greater => 1,
        Ordering::Less => 2,
        Ordering::Equal => 3,
    }
}

/// Numeric component of a "Round N" label; unparseable labels sort last.
fn round_number(name: &str) -> u32 {
    name.strip_prefix("Round")
        .map(str::trim)
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_ids_cover_win_loss_draw() {
        assert_eq!(result_id(10, 5), 1);
        assert_eq!(result_id(5, 10), 2);
        assert_eq!(result_id(7, 7), 3);
    }

    #[test]
    fn rounds_sort_numerically_not_lexically() {
        let mut names = vec!["Round 10", "Round 2", "Round 1", "Finals"];
        names.sort_by_key(|name| round_number(name));
        assert_eq!(names, vec!["Round 1", "Round 2", "Round 10", "Finals"]);
    }

    #[test]
    fn ladder_goal_average_handles_zero_against() {
        let row = ladder_row_from_upstream(UpstreamLadderRow {
            rk: 1,
            name: "Comets".into(),
            played: 5,
            wins: 5,
            losses: 0,
            draws: 0,
            goals_for: 100,
            goals_against: 0,
            points: 10,
        });
        assert_eq!(row.goal_average, 0.0);

        let row = ladder_row_from_upstream(UpstreamLadderRow {
            rk: 2,
            name: "Sparks".into(),
            played: 5,
            wins: 2,
            losses: 3,
            draws: 0,
            goals_for: 50,
            goals_against: 100,
            points: 4,
        });
        assert_eq!(row.goal_average, 50.0);
    }

    #[test]
    fn upstream_fixture_parses_numeric_ids() {
        let upstream: UpstreamFixtures = serde_json::from_str(
            r#"{"rounds":[{"name":"Round 1","matches":[
                {"id":123,"startTime":"2026-03-07T09:00:00Z",
                 "team1":{"name":"Comets"},"team2":{"name":"Sparks"},
                 "team1Score":12,"team2Score":9,"matchStatus":"ENDED"}
            ]}]}"#,
        )
        .unwrap();
        let round = round_from_upstream(upstream.rounds.into_iter().next().unwrap());
        assert_eq!(round.matches[0].id, "123");
        assert_eq!(round.matches[0].team1_result_id, 1);
        assert_eq!(round.matches[0].team2_result_id, 2);
    }
}

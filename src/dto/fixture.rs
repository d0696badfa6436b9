use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payload of the `getFixtureData` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FixturePayload {
    /// All rounds with their matches, sorted by round number.
    pub fixtures: Vec<FixtureRound>,
}

/// One round of matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct FixtureRound {
    /// Round label (e.g. "Round 7").
    pub name: String,
    /// Matches played in this round.
    pub matches: Vec<FixtureMatch>,
}

/// A single fixture match result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FixtureMatch {
    /// Upstream match identifier.
    pub id: String,
    /// Scheduled start time, RFC 3339.
    pub start_time: String,
    /// First team.
    pub team1: FixtureTeam,
    /// Second team.
    pub team2: FixtureTeam,
    /// First team's score.
    pub team1_score: u16,
    /// Second team's score.
    pub team2_score: u16,
    /// 1 = win, 2 = loss, 3 = draw, from team1's perspective.
    pub team1_result_id: u8,
    /// 1 = win, 2 = loss, 3 = draw, from team2's perspective.
    pub team2_result_id: u8,
    /// Upstream match status string.
    pub match_status: String,
}

/// Team reference inside a fixture match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct FixtureTeam {
    /// Team name as known to the competition.
    pub name: String,
}

/// Payload of the `getSquadiLadder` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LadderPayload {
    /// Standings rows in rank order.
    pub ladder: Vec<LadderRow>,
}

/// One standings row in the competition ladder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LadderRow {
    /// Rank.
    pub rk: u8,
    /// Team name.
    pub name: String,
    /// Games played.
    #[serde(rename = "P")]
    pub played: u16,
    /// Wins.
    #[serde(rename = "W")]
    pub wins: u16,
    /// Losses.
    #[serde(rename = "L")]
    pub losses: u16,
    /// Draws.
    #[serde(rename = "D")]
    pub draws: u16,
    /// Goals for.
    #[serde(rename = "F")]
    pub goals_for: u32,
    /// Goals against.
    #[serde(rename = "A")]
    pub goals_against: u32,
    /// Percentage of goals for over against.
    pub goal_average: f64,
    /// Ladder points.
    #[serde(rename = "PTS")]
    pub points: u16,
}

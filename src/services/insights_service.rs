//! Thin pass-through to an external text-generation capability.
//!
//! The model behind the insight actions is out of scope; this module only
//! shapes requests and surfaces the generated text.

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    dto::insights::{InsightsPayload, TrainingFocusPayload},
    error::ServiceError,
    state::SharedState,
};

/// What kind of narrative is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightKind {
    /// Season-level team analysis.
    Team,
    /// Single-game summary.
    Game,
    /// Per-player analysis.
    Player,
    /// Training focus suggestions.
    TrainingFocus,
}

impl InsightKind {
    fn as_str(self) -> &'static str {
        match self {
            InsightKind::Team => "team",
            InsightKind::Game => "game",
            InsightKind::Player => "player",
            InsightKind::TrainingFocus => "trainingFocus",
        }
    }
}

/// Opaque text generator the insight actions delegate to.
pub trait InsightsGenerator: Send + Sync {
    /// Produce narrative text for the given analytics payload.
    fn generate(
        &self,
        kind: InsightKind,
        payload: Value,
    ) -> BoxFuture<'static, Result<String, ServiceError>>;
}

/// Generator forwarding to an external HTTP endpoint.
pub struct HttpInsightsGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpInsightsGenerator {
    /// Create a generator posting to `url`.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Deserialize)]
struct GeneratedText {
    text: String,
}

impl InsightsGenerator for HttpInsightsGenerator {
    fn generate(
        &self,
        kind: InsightKind,
        payload: Value,
    ) -> BoxFuture<'static, Result<String, ServiceError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&json!({ "kind": kind.as_str(), "data": payload }))
                .send()
                .await
                .map_err(|err| ServiceError::Upstream(err.to_string()))?;

            if !response.status().is_success() {
                return Err(ServiceError::Upstream(format!(
                    "insights endpoint returned {}",
                    response.status()
                )));
            }

            let generated = response
                .json::<GeneratedText>()
                .await
                .map_err(|err| ServiceError::Upstream(err.to_string()))?;
            Ok(generated.text)
        })
    }
}

/// Generator used when no endpoint is configured: returns a fixed notice so
/// the actions stay functional in development.
pub struct StaticInsightsGenerator;

impl InsightsGenerator for StaticInsightsGenerator {
    fn generate(
        &self,
        kind: InsightKind,
        _payload: Value,
    ) -> BoxFuture<'static, Result<String, ServiceError>> {
        let text = format!(
            "Insights generation is not configured on this deployment ({}).",
            kind.as_str()
        );
        Box::pin(async move { Ok(text) })
    }
}

/// Team-level insights from precomputed analytics.
pub async fn team_insights(
    state: &SharedState,
    analytics: Value,
) -> Result<InsightsPayload, ServiceError> {
    let insights = state
        .insights_generator()
        .generate(InsightKind::Team, analytics)
        .await?;
    Ok(InsightsPayload { insights })
}

/// Game summary insights.
pub async fn game_insights(
    state: &SharedState,
    game_data: Value,
) -> Result<InsightsPayload, ServiceError> {
    let insights = state
        .insights_generator()
        .generate(InsightKind::Game, game_data)
        .await?;
    Ok(InsightsPayload { insights })
}

/// Per-player insights.
pub async fn player_insights(
    state: &SharedState,
    player_data: Value,
) -> Result<InsightsPayload, ServiceError> {
    let insights = state
        .insights_generator()
        .generate(InsightKind::Player, player_data)
        .await?;
    Ok(InsightsPayload { insights })
}

/// Training focus suggestions.
pub async fn training_focus(
    state: &SharedState,
    training_data: Value,
) -> Result<TrainingFocusPayload, ServiceError> {
    let suggestions = state
        .insights_generator()
        .generate(InsightKind::TrainingFocus, training_data)
        .await?;
    Ok(TrainingFocusPayload { suggestions })
}

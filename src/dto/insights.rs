use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payload of the team/game/player insight responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InsightsPayload {
    /// Generated narrative text.
    pub insights: String,
}

/// Payload of the `getTrainingFocus` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingFocusPayload {
    /// Generated training suggestions text.
    pub suggestions: String,
}

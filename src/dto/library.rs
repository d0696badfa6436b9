use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::PlayerLibraryEntity;

/// Payload of the `getPlayerLibrary` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibraryPayload {
    /// The cross-team player registry.
    pub player_library: PlayerLibraryEntity,
}

/// Body of the `savePlayerLibrary` POST action.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveLibraryRequest {
    /// Replacement registry contents.
    pub player_library: PlayerLibraryEntity,
}

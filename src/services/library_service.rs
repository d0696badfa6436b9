//! Cross-team player library reads and writes.

use crate::{
    dao::models::PlayerLibraryEntity,
    dto::library::LibraryPayload,
    error::ServiceError,
    state::SharedState,
};

/// Load the player library, defaulting to an empty registry when none has
/// been saved yet.
pub async fn load_library(state: &SharedState) -> Result<LibraryPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let player_library = store.load_library().await?.unwrap_or_default();
    Ok(LibraryPayload { player_library })
}

/// Replace the player library wholesale.
pub async fn save_library(
    state: &SharedState,
    library: PlayerLibraryEntity,
) -> Result<(), ServiceError> {
    let store = state.require_team_store().await?;
    store.store_library(library).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::dao::models::LibraryPlayerEntity;
    use crate::dao::team_store::memory::MemoryTeamStore;
    use crate::services::insights_service::StaticInsightsGenerator;
    use crate::state::AppState;

    #[tokio::test]
    async fn missing_library_reads_as_empty() {
        let state = AppState::new(AppConfig::default(), Arc::new(StaticInsightsGenerator));
        state
            .install_team_store(Arc::new(MemoryTeamStore::new()))
            .await;

        let payload = load_library(&state).await.unwrap();
        assert!(payload.player_library.players.is_empty());

        save_library(
            &state,
            PlayerLibraryEntity {
                players: vec![LibraryPlayerEntity {
                    id: "lib_1".into(),
                    name: "Asha".into(),
                    team_ids: vec!["team_1".into()],
                    notes: None,
                }],
            },
        )
        .await
        .unwrap();

        let payload = load_library(&state).await.unwrap();
        assert_eq!(payload.player_library.players.len(), 1);
    }
}

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the rostersync backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::api::api_read,
        crate::routes::api::api_write,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::team::TeamSummary,
            crate::dto::team::TeamsPayload,
            crate::dto::team::TeamDataPayload,
            crate::dto::team::TeamDataBody,
            crate::dto::team::SaveTeamRequest,
            crate::dto::team::TeamSettingsPatch,
            crate::dto::team::CreateTeamRequest,
            crate::dto::team::PinTokenPayload,
            crate::dto::team::SaveAcceptedPayload,
            crate::dto::team::TeamRowPayload,
            crate::dto::team::TeamRow,
            crate::dto::team::PingPayload,
            crate::dto::library::LibraryPayload,
            crate::dto::diagnostics::DiagnosticsPayload,
            crate::dto::insights::InsightsPayload,
            crate::dto::insights::TrainingFocusPayload,
            crate::dto::fixture::FixturePayload,
            crate::dto::fixture::FixtureRound,
            crate::dto::fixture::FixtureMatch,
            crate::dto::fixture::FixtureTeam,
            crate::dto::fixture::LadderPayload,
            crate::dto::fixture::LadderRow,
            crate::dao::models::TeamDocumentEntity,
            crate::dao::models::PlayerEntity,
            crate::dao::models::GameEntity,
            crate::dao::models::LineupSlotEntity,
            crate::dao::models::PlayerLibraryEntity,
            crate::dao::models::LibraryPlayerEntity,
            crate::dao::models::MetricEntity,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "actions", description = "Action-dispatch API surface"),
    )
)]
pub struct ApiDoc;

//! Client-reported metric rows, persisted for later inspection.

use validator::Validate;

use crate::{
    dao::models::MetricEntity,
    dto::diagnostics::{DiagnosticsPayload, LogMetricRequest},
    error::ServiceError,
    services::team_service::now_rfc3339,
    state::SharedState,
};

/// Default row count returned by `getDiagnostics`.
pub const DEFAULT_DIAGNOSTICS_LIMIT: usize = 50;

/// Append one metric row.
pub async fn log_metric(
    state: &SharedState,
    request: LogMetricRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    let store = state.require_team_store().await?;
    store
        .append_metric(MetricEntity {
            timestamp: now_rfc3339(),
            metric: request.name,
            value: request.value,
            teams: request.teams,
            extra: request.extra,
        })
        .await?;
    Ok(())
}

/// Newest-first metric rows, at most `limit`.
pub async fn get_diagnostics(
    state: &SharedState,
    limit: usize,
) -> Result<DiagnosticsPayload, ServiceError> {
    let store = state.require_team_store().await?;
    let diagnostics = store.list_metrics(limit).await?;
    Ok(DiagnosticsPayload { diagnostics })
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::MetricEntity;

/// Parameters of the `logClientMetric` action.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct LogMetricRequest {
    /// Metric name.
    #[validate(length(min = 1, message = "name parameter is required"))]
    pub name: String,
    /// Metric value as sent by the client.
    #[serde(default)]
    pub value: String,
    /// Team count or identifier context.
    #[serde(default)]
    pub teams: String,
    /// Extra free-form context.
    #[serde(default)]
    pub extra: String,
}

/// Payload of the `getDiagnostics` response, newest rows first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsPayload {
    /// Recorded metric rows.
    pub diagnostics: Vec<MetricEntity>,
}

use std::collections::BTreeSet;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::health::{HealthReport, OverallStatus};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Comma-separated check names; all checks run when absent.
    pub checks: Option<String>,
}

/// GET /health
/// Runs the registered health checks. 503 only when none of them is healthy.
pub async fn health_handler(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> Result<(StatusCode, Json<HealthReport>), AppError> {
    let report = match query.checks.as_deref().map(str::trim) {
        None | Some("") => state.health.run_all().await,
        Some(raw) => {
            let wanted: BTreeSet<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect();
            if wanted.is_empty() {
                return Err(AppError::Validation("No health checks selected".to_string()));
            }
            let known: BTreeSet<&str> = state.health.check_names().collect();
            if let Some(unknown) = wanted.iter().find(|name| !known.contains(*name)) {
                return Err(AppError::Validation(format!(
                    "Unknown health check '{unknown}'"
                )));
            }
            state
                .health
                .run_selected(|name| wanted.contains(name))
                .await
        }
    };

    let status = match report.status {
        OverallStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
        OverallStatus::Ok | OverallStatus::Degraded => StatusCode::OK,
    };
    Ok((status, Json(report)))
}

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{api::state::AppState, error::RosterServiceError};

/// Synchronous solve: blocks for the duration of the search and returns the
/// full output schema. Incremental and empty-slots documents are routed by
/// their marker fields, so the same handler backs all three modes.
#[utoipa::path(
    post,
    path = "/api/v1/solve",
    tag = "Solve",
    responses(
        (status = 200, description = "Solved roster with hour annotations"),
        (status = 400, description = "Validation failure with field errors"),
        (status = 413, description = "Problem exceeds the server tier")
    )
)]
#[tracing::instrument(skip(state, input))]
pub async fn solve(
    State(state): State<Arc<AppState>>,
    Json(input): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, RosterServiceError> {
    let output = state.solve_service.solve_sync(input).await?;
    Ok(Json(output))
}

/// v2 solve: identical pipeline; requests carrying `dailyHeadcount` tables
/// additionally get the per-day coverage summary in the response.
#[utoipa::path(
    post,
    path = "/api/v2/solve",
    tag = "Solve",
    responses(
        (status = 200, description = "Solved roster with dailyCoverage enrichment")
    )
)]
#[tracing::instrument(skip(state, input))]
pub async fn solve_v2(
    State(state): State<Arc<AppState>>,
    Json(input): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, RosterServiceError> {
    let output = state.solve_service.solve_sync(input).await?;
    Ok(Json(output))
}

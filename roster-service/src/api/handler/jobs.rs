use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;

use shared::responses::ApiResponse;

use crate::{
    api::state::AppState,
    domain::{job::JobRecord, service::SubmitResponse},
    error::RosterServiceError,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// The full solve document, passed to the engine untouched.
    #[schema(value_type = Object)]
    pub input: serde_json::Value,
    /// Optional completion webhook, fired on every terminal state.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    request_body = SubmitRequest,
    responses(
        (status = 202, description = "Job queued", body = ApiResponse<SubmitResponse>),
        (status = 400, description = "Input failed validation")
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<impl IntoResponse, RosterServiceError> {
    let response = state
        .solve_service
        .submit(request.input, request.webhook_url)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::ok(response))))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/status",
    tag = "Jobs",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job status", body = ApiResponse<JobRecord>),
        (status = 404, description = "Unknown job")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobRecord>>, RosterServiceError> {
    let record = state.solve_service.get_status(&job_id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/result",
    tag = "Jobs",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Full solve output"),
        (status = 404, description = "Unknown job"),
        (status = 410, description = "Expired, failed or cancelled"),
        (status = 425, description = "Not yet completed")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, RosterServiceError> {
    let output = state.solve_service.get_result(&job_id).await?;
    Ok(Json(output))
}

#[utoipa::path(
    post,
    path = "/api/v1/jobs/{job_id}/cancel",
    tag = "Jobs",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cancellation requested", body = ApiResponse<JobRecord>),
        (status = 404, description = "Unknown job")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobRecord>>, RosterServiceError> {
    let record = state.solve_service.cancel(&job_id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

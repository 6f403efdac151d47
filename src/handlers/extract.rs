//! Document-to-tasks extraction, synchronous and as a background job

use crate::contract::extraction::ExtractionResult;
use crate::error::AppResult;
use crate::handlers::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub document: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: String,
}

/// POST /ai/doc-to-tasks
pub async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> AppResult<Json<ExtractionResult>> {
    let result = state.service().extract(&request.document).await?;
    Ok(Json(result))
}

/// POST /ai/doc-to-tasks/jobs; poll `GET /ai/jobs/{id}` for the outcome
pub async fn submit_handler(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> AppResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = state.service().submit_extraction(request.document)?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

//! POST /ai/analyze

use crate::contract::insights::ProjectInsights;
use crate::error::AppResult;
use crate::handlers::AppState;
use crate::project::{ProjectInput, TaskInput};
use axum::{Json, extract::State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub project: ProjectInput,
    #[serde(default)]
    pub tasks: Vec<TaskInput>,
}

pub async fn handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> AppResult<Json<ProjectInsights>> {
    let insights = state
        .service()
        .analyze(&request.project, &request.tasks)
        .await?;
    Ok(Json(insights))
}

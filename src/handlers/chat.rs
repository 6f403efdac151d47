//! POST /ai/chat
//!
//! Free-form question over the project's tasks and context. Prior turns
//! may be sent as `history`; only the most recent ones reach the model.

use crate::backends::ChatMessage;
use crate::error::AppResult;
use crate::handlers::AppState;
use crate::project::{ProjectInput, TaskInput};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub project: ProjectInput,
    #[serde(default)]
    pub tasks: Vec<TaskInput>,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

pub async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let answer = state
        .service()
        .chat(
            &request.project,
            &request.tasks,
            &request.question,
            &request.history,
        )
        .await?;
    Ok(Json(ChatResponse { answer }))
}

//! GET /ai/jobs/{id}

use crate::error::AppResult;
use crate::handlers::AppState;
use crate::jobs::Job;
use axum::{
    Json,
    extract::{Path, State},
};

pub async fn handler(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Job>> {
    Ok(Json(state.service().job_status(&id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::handlers::test_support::state_with_reply;

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let err = handler(State(state_with_reply(None)), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::JobNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_known_job_returned() {
        let state = state_with_reply(Some("[]"));
        let id = state.service().submit_extraction("Doc".to_string()).unwrap();

        let Json(job) = handler(State(state), Path(id.clone())).await.unwrap();
        assert_eq!(job.id, id);
    }
}

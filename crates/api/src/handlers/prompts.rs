//! Handlers for a job's interactive prompts.
//!
//! `answer_prompt` is the single externally triggered mutation into a job's
//! prompt registry; everything else is read-only.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use nimbus_core::types::JobId;
use nimbus_core::PromptAnswer;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/clusters/{id}/prompts
///
/// All prompts of the job, in creation order.
pub async fn list_prompts(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let session = state.registry.find(id).await?;
    Ok(Json(DataResponse {
        data: session.list_prompts().await,
    }))
}

/// GET /api/v1/clusters/{id}/prompts/{prompt_id}
pub async fn get_prompt(
    State(state): State<AppState>,
    Path((id, prompt_id)): Path<(JobId, String)>,
) -> AppResult<impl IntoResponse> {
    let session = state.registry.find(id).await?;
    let prompt = session.find_prompt(&prompt_id).await?;
    Ok(Json(DataResponse { data: prompt }))
}

/// POST /api/v1/clusters/{id}/prompts/{prompt_id}
///
/// Submit the operator's answer. Exactly one answer wins: a second POST for
/// the same prompt gets 409, an unknown prompt or job gets 404. On success
/// the blocked worker resumes immediately.
pub async fn answer_prompt(
    State(state): State<AppState>,
    Path((id, prompt_id)): Path<(JobId, String)>,
    Json(answer): Json<PromptAnswer>,
) -> AppResult<impl IntoResponse> {
    let session = state.registry.find(id).await?;
    let resolved = session.answer_prompt(&prompt_id, answer).await?;
    Ok(Json(DataResponse { data: resolved }))
}

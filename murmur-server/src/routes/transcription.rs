//! Transcription submission endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::task::{TaskCreatedResponse, TranscribeRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(create_transcription))]
pub struct TranscriptionApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/transcribe", post(create_transcription))
}

/// Submit an audio transcription task.
///
/// Returns immediately with a `pending` task id; poll
/// `GET /api/status/{id}` for progress and `GET /api/result/{id}` once
/// completed.
#[utoipa::path(
    post,
    path = "/api/transcribe",
    tag = "transcription",
    request_body = TranscribeRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskCreatedResponse),
        (status = 400, description = "Invalid request"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn create_transcription(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranscribeRequest>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), ServerError> {
    let (config, input) = req.into_task()?;
    let snapshot = state.manager.submit(config, input).await?;
    info!(task_id = %snapshot.id, "transcription task accepted");
    Ok((StatusCode::ACCEPTED, Json(snapshot.into())))
}

//! Translation submission endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::task::{TaskCreatedResponse, TranslateRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(create_translation))]
pub struct TranslationApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/translate", post(create_translation))
}

/// Submit an LRC subtitle translation task.
///
/// The LRC content is validated synchronously (empty or timestamp-free
/// documents are rejected with 400); the translation itself runs
/// asynchronously.
#[utoipa::path(
    post,
    path = "/api/translate",
    tag = "translation",
    request_body = TranslateRequest,
    responses(
        (status = 202, description = "Task accepted", body = TaskCreatedResponse),
        (status = 400, description = "Invalid request or LRC content"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn create_translation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateRequest>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), ServerError> {
    let (config, input) = req.into_task();
    let snapshot = state.manager.submit(config, input).await?;
    info!(task_id = %snapshot.id, "translation task accepted");
    Ok((StatusCode::ACCEPTED, Json(snapshot.into())))
}

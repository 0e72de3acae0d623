//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Internal errors are logged with full detail but only
//! a generic message is returned to the caller so that file paths, command
//! lines, or other implementation details never leak to clients.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use murmur_core::{OrchestrationError, RateLimitExceeded, RateLimitInfo};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the murmur-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller referenced a task that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The task exists but is not in a state that allows the operation
    /// (e.g. asking for the result of a task that is still running).
    #[error("conflict: {0}")]
    WrongState(String),

    /// The client exhausted its request quota.
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    /// The orchestrator refused the request because it is shutting down.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<OrchestrationError> for ServerError {
    fn from(e: OrchestrationError) -> Self {
        match e {
            OrchestrationError::TaskNotFound(id) => {
                ServerError::NotFound(format!("task {id} not found"))
            }
            OrchestrationError::Validation { .. } | OrchestrationError::UnsupportedTaskType(_) => {
                ServerError::BadRequest(e.to_string())
            }
            OrchestrationError::ResultNotReady { id, status, error } => {
                ServerError::WrongState(match error {
                    Some(err) => format!("task {id} is not completed (status: {status}): {err}"),
                    None => format!("task {id} is not completed (status: {status})"),
                })
            }
            OrchestrationError::Shutdown => ServerError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::WrongState(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),

            ServerError::RateLimited(denied) => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": denied.to_string() })),
                )
                    .into_response();
                apply_rate_limit_headers(&mut response, &denied.info);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(denied.retry_after_secs));
                return response;
            }

            // Internal errors: log the full detail, return a generic message.
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full error chain before discarding it so diagnostic
        // detail is preserved in the server logs even though clients only
        // see a generic message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

/// Attach `X-RateLimit-*` quota headers to a response. Used both by the
/// admission middleware on success and by the 429 rejection above.
pub fn apply_rate_limit_headers(response: &mut Response, info: &RateLimitInfo) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(info.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset_secs));
}

//! Task polling, listing, cancellation and stats endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use murmur_core::{TaskFilter, TaskId, TaskStatus, TaskType};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use crate::error::ServerError;
use crate::schemas::task::{CancelResponse, StatsResponse, TaskListResponse, TaskStatusResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_status, get_result, list_tasks, cancel_task, get_stats))]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status/{id}", get(get_status))
        .route("/result/{id}", get(get_result))
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", delete(cancel_task))
        .route("/stats", get(get_stats))
}

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTasksQuery {
    /// Filter by task type (`transcription` / `translation`).
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    /// Filter by status (`pending`, `processing`, `completed`, `failed`,
    /// `cancelled`).
    pub status: Option<String>,
    /// Page size, clamped to [1, 1000] (default: 100).
    pub limit: Option<usize>,
    /// Number of matching tasks to skip (default: 0).
    pub offset: Option<usize>,
}

impl ListTasksQuery {
    fn filter(&self) -> Result<TaskFilter, ServerError> {
        let task_type = self
            .task_type
            .as_deref()
            .map(TaskType::from_str)
            .transpose()
            .map_err(|_| {
                ServerError::BadRequest(format!(
                    "unknown task type '{}'",
                    self.task_type.as_deref().unwrap_or_default()
                ))
            })?;
        let status = self
            .status
            .as_deref()
            .map(TaskStatus::from_str)
            .transpose()
            .map_err(|_| {
                ServerError::BadRequest(format!(
                    "unknown status '{}'",
                    self.status.as_deref().unwrap_or_default()
                ))
            })?;
        Ok(TaskFilter { task_type, status })
    }
}

/// Poll the status of a task.
#[utoipa::path(
    get,
    path = "/api/status/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Current task status", body = TaskStatusResponse),
        (status = 404, description = "No such task"),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskStatusResponse>, ServerError> {
    let snapshot = state.manager.get_status(id).await?;
    Ok(Json(snapshot.into()))
}

/// Fetch the result of a completed task.
///
/// Tasks in any non-`completed` state yield 409; the body of a failed
/// task's 409 carries the failure reason.
#[utoipa::path(
    get,
    path = "/api/result/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task result", body = Value),
        (status = 404, description = "No such task"),
        (status = 409, description = "Task is not completed"),
    )
)]
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<Value>, ServerError> {
    let result = state.manager.get_result(id).await?;
    Ok(Json(json!({ "task_id": id, "result": result })))
}

/// List tasks in creation order, optionally filtered.
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "One page of tasks", body = TaskListResponse),
        (status = 400, description = "Unknown type or status filter"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<TaskListResponse>, ServerError> {
    let filter = query.filter()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let (page, total) = state.manager.list(filter, limit, offset).await;
    Ok(Json(TaskListResponse {
        tasks: page.into_iter().map(TaskStatusResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Cancel a task.
///
/// Pending tasks are cancelled before they ever run; processing tasks
/// are reported cancelled immediately while their executor winds down.
/// Cancelling an already-finished task acks with its existing status.
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Cancellation acknowledged", body = CancelResponse),
        (status = 404, description = "No such task"),
    )
)]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<CancelResponse>, ServerError> {
    let snapshot = state.manager.cancel(id).await?;
    Ok(Json(snapshot.into()))
}

/// Aggregate task counters.
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "tasks",
    responses(
        (status = 200, description = "Registry statistics", body = StatsResponse),
    )
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(state.manager.stats().await.into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_query_parses_known_filters() {
        let query = ListTasksQuery {
            task_type: Some("translation".into()),
            status: Some("processing".into()),
            limit: None,
            offset: None,
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.task_type, Some(TaskType::Translation));
        assert_eq!(filter.status, Some(TaskStatus::Processing));
    }

    #[test]
    fn list_query_rejects_unknown_filters() {
        let query = ListTasksQuery {
            task_type: Some("alchemy".into()),
            status: None,
            limit: None,
            offset: None,
        };
        assert!(matches!(
            query.filter(),
            Err(ServerError::BadRequest(_))
        ));
    }
}

use utoipa::OpenApi;

use crate::routes::{health, tasks, transcription, translation};
use crate::schemas::task::{
    CancelResponse, StatsResponse, TaskCreatedResponse, TaskErrorBody, TaskListResponse,
    TaskStatusResponse, TranscribeRequest, TranslateRequest,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "murmur-server",
        description = "Async transcription and subtitle translation API",
        version = "0.1.0",
    ),
    components(schemas(
        TranscribeRequest,
        TranslateRequest,
        TaskCreatedResponse,
        TaskStatusResponse,
        TaskErrorBody,
        TaskListResponse,
        StatsResponse,
        CancelResponse,
    ))
)]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(transcription::TranscriptionApi::openapi());
    root.merge(translation::TranslationApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root
}

//! Wire models for the task API.
//!
//! Request bodies validate their shape here (exactly one input source,
//! parseable enums) and convert into core types; responses are flat,
//! string-typed views of core snapshots so the JSON surface stays stable
//! even if internal enums grow.

use chrono::{DateTime, Utc};
use murmur_core::{
    InputRef, LanguageCode, OutputFormat, StatsSnapshot, TaskConfig, TaskSnapshot,
    TranscriptionConfig, TranslationConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ServerError;

/// Request a new audio transcription task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TranscribeRequest {
    /// Remote media URL. Exactly one of `url` / `path` must be set.
    #[schema(example = "https://example.com/audio.mp3")]
    pub url: Option<String>,
    /// Path to an audio file already on the server.
    pub path: Option<String>,
    /// Subtitle rendering of the result (default: `lrc`).
    #[schema(value_type = Option<String>, example = "lrc")]
    pub output_format: Option<OutputFormat>,
    /// Source language hint (default: `ja`).
    pub language: Option<String>,
}

impl TranscribeRequest {
    pub fn into_task(self) -> Result<(TaskConfig, InputRef), ServerError> {
        let input = match (self.url, self.path) {
            (Some(url), None) => InputRef::Url(url),
            (None, Some(path)) => InputRef::Path(path.into()),
            _ => {
                return Err(ServerError::BadRequest(
                    "exactly one of 'url' or 'path' must be provided".to_owned(),
                ));
            }
        };
        let defaults = TranscriptionConfig::default();
        let config = TaskConfig::Transcription(TranscriptionConfig {
            output_format: self.output_format.unwrap_or(defaults.output_format),
            language: self.language.unwrap_or(defaults.language),
        });
        Ok((config, input))
    }
}

/// Request a new subtitle translation task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TranslateRequest {
    /// LRC document to translate (`[mm:ss.xx]text` lines).
    #[schema(example = "[00:01.00]こんにちは")]
    pub lrc_content: String,
    /// Target language code (`en`, `zh-cn`, `zh-tw`, `ko`, `ru`, `fr`).
    #[schema(value_type = String, example = "zh-cn")]
    pub target_language: LanguageCode,
    /// Translator backend name; omit for the server default.
    pub translator: Option<String>,
}

impl TranslateRequest {
    pub fn into_task(self) -> (TaskConfig, InputRef) {
        let config = TaskConfig::Translation(TranslationConfig {
            target_language: self.target_language,
            translator: self.translator,
        });
        (config, InputRef::Inline(self.lrc_content))
    }
}

/// Returned by both submission endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskCreatedResponse {
    pub task_id: Uuid,
    pub task_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<TaskSnapshot> for TaskCreatedResponse {
    fn from(s: TaskSnapshot) -> Self {
        Self {
            task_id: s.id,
            task_type: s.task_type.to_string(),
            status: s.status.to_string(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskErrorBody {
    pub kind: String,
    pub message: String,
}

/// Full status view of a task.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub task_type: String,
    pub status: String,
    /// Completion fraction in [0.0, 1.0].
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds; present only while processing with nonzero progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskErrorBody>,
    pub cancel_requested: bool,
}

impl From<TaskSnapshot> for TaskStatusResponse {
    fn from(s: TaskSnapshot) -> Self {
        Self {
            task_id: s.id,
            task_type: s.task_type.to_string(),
            status: s.status.to_string(),
            progress: s.progress,
            current_step: s.current_step,
            created_at: s.created_at,
            updated_at: s.updated_at,
            started_at: s.started_at,
            completed_at: s.completed_at,
            estimated_time_remaining: s.estimated_time_remaining,
            error: s.error.map(|e| TaskErrorBody {
                kind: e.kind.to_string(),
                message: e.message,
            }),
            cancel_requested: s.cancel_requested,
        }
    }
}

/// One page of tasks, plus the total match count for pagination.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskStatusResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Aggregate registry counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_tasks: usize,
    pub active_tasks: usize,
    pub max_concurrent_tasks: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub task_type_counts: BTreeMap<String, usize>,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(s: StatsSnapshot) -> Self {
        Self {
            total_tasks: s.total_tasks,
            active_tasks: s.active_tasks,
            max_concurrent_tasks: s.max_concurrent_tasks,
            status_counts: s
                .status_counts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            task_type_counts: s
                .task_type_counts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

/// Acknowledgement of a cancellation request.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    pub task_id: Uuid,
    /// Terminal status after the cancel: `cancelled`, or the existing
    /// terminal status when the task had already finished.
    pub status: String,
    pub cancel_requested: bool,
}

impl From<TaskSnapshot> for CancelResponse {
    fn from(s: TaskSnapshot) -> Self {
        Self {
            task_id: s.id,
            status: s.status.to_string(),
            cancel_requested: s.cancel_requested,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transcribe_request_requires_exactly_one_input() {
        let both = TranscribeRequest {
            url: Some("https://example.com/a.mp3".into()),
            path: Some("/tmp/a.mp3".into()),
            output_format: None,
            language: None,
        };
        assert!(both.into_task().is_err());

        let neither = TranscribeRequest {
            url: None,
            path: None,
            output_format: None,
            language: None,
        };
        assert!(neither.into_task().is_err());

        let url_only = TranscribeRequest {
            url: Some("https://example.com/a.mp3".into()),
            path: None,
            output_format: None,
            language: None,
        };
        let (config, input) = url_only.into_task().unwrap();
        assert!(matches!(input, InputRef::Url(_)));
        let TaskConfig::Transcription(cfg) = config else {
            panic!("expected transcription config");
        };
        assert_eq!(cfg.language, "ja");
        assert_eq!(cfg.output_format, OutputFormat::Lrc);
    }

    #[test]
    fn translate_request_parses_language_codes() {
        let req: TranslateRequest = serde_json::from_str(
            r#"{"lrc_content":"[00:01.00]text","target_language":"zh-cn"}"#,
        )
        .unwrap();
        assert_eq!(req.target_language, LanguageCode::ChineseSimplified);
        assert!(serde_json::from_str::<TranslateRequest>(
            r#"{"lrc_content":"x","target_language":"klingon"}"#
        )
        .is_err());
    }
}

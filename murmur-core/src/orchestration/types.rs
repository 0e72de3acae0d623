use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::subtitle::{self, SubtitleEntry};

/// Unique identifier for a submitted task. Never reused for the lifetime
/// of the process.
pub type TaskId = uuid::Uuid;

/// The two kinds of work the orchestrator knows how to dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskType {
    Transcription,
    Translation,
}

/// Lifecycle state of a task.
///
/// Transitions: `Pending → Processing → {Completed, Failed}`, plus
/// `Pending → Cancelled` and `Processing → Cancelled`. The last three
/// are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` once the task can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Subtitle output rendering for transcription results.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Lrc,
    Srt,
    Json,
}

/// Translation target languages. The source language is always Japanese.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum LanguageCode {
    #[serde(rename = "ja")]
    #[strum(serialize = "ja")]
    Japanese,
    #[serde(rename = "en")]
    #[strum(serialize = "en")]
    English,
    #[serde(rename = "zh-cn")]
    #[strum(serialize = "zh-cn")]
    ChineseSimplified,
    #[serde(rename = "zh-tw")]
    #[strum(serialize = "zh-tw")]
    ChineseTraditional,
    #[serde(rename = "ko")]
    #[strum(serialize = "ko")]
    Korean,
    #[serde(rename = "ru")]
    #[strum(serialize = "ru")]
    Russian,
    #[serde(rename = "fr")]
    #[strum(serialize = "fr")]
    French,
}

/// Opaque handle to an already-acquired input. Resolution (download,
/// upload decoding, size checks) happens before task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum InputRef {
    /// A file already present on the server's filesystem.
    Path(PathBuf),
    /// A remote media URL the transcription executor will fetch itself.
    Url(String),
    /// Inline text content (LRC input for translation).
    Inline(String),
}

/// Type-specific parameters, frozen at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskConfig {
    Transcription(TranscriptionConfig),
    Translation(TranslationConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Source language hint for the speech-to-text backend.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "ja".to_owned()
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub target_language: LanguageCode,
    /// Translator backend selection; `None` uses the server default.
    #[serde(default)]
    pub translator: Option<String>,
}

impl TaskConfig {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskConfig::Transcription(_) => TaskType::Transcription,
            TaskConfig::Translation(_) => TaskType::Translation,
        }
    }

    /// Submit-time validation. Failing here means the task is never
    /// created and the registry keeps no trace of the request.
    pub fn validate(&self, input: &InputRef) -> Result<(), OrchestrationError> {
        match self {
            TaskConfig::Transcription(_) => match input {
                InputRef::Path(_) | InputRef::Url(_) => Ok(()),
                InputRef::Inline(_) => Err(self.invalid(
                    "transcription input must be a file path or a media URL",
                )),
            },
            TaskConfig::Translation(cfg) => {
                if cfg.target_language == LanguageCode::Japanese {
                    return Err(
                        self.invalid("target language cannot be Japanese (source is Japanese)")
                    );
                }
                let InputRef::Inline(content) = input else {
                    return Err(self.invalid("translation input must be inline LRC content"));
                };
                if content.trim().is_empty() {
                    return Err(self.invalid("LRC content cannot be empty"));
                }
                if subtitle::parse_lrc(content).is_empty() {
                    return Err(self.invalid("invalid LRC format: no timestamped lines found"));
                }
                Ok(())
            }
        }
    }

    fn invalid(&self, reason: &str) -> OrchestrationError {
        OrchestrationError::Validation {
            task_type: self.task_type(),
            reason: reason.to_owned(),
        }
    }
}

/// Ancillary information executors attach to their results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_duration_secs: Option<f64>,
}

/// A single translated subtitle line. `translated_text` is `None` when
/// the translator failed for this entry; the original text is kept so
/// the output is still usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub start: f64,
    pub end: f64,
    pub original_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub entries: Vec<SubtitleEntry>,
    /// Rendered subtitle document in the requested output format.
    pub content: String,
    pub format: OutputFormat,
    pub metadata: TaskMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub entries: Vec<TranslationEntry>,
    /// Translated document rendered back to LRC.
    pub content: String,
    pub total_entries: usize,
    pub translated_entries: usize,
    pub failed_entries: usize,
    pub metadata: TaskMetadata,
}

/// Terminal payload of a successfully completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskResult {
    Transcription(TranscriptionResult),
    Translation(TranslationResult),
}

/// Broad classification of executor failures, stored on failed tasks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorKind {
    Transcription,
    Translation,
    Input,
    Io,
    Internal,
}

/// A classified executor failure. Recorded on the task verbatim; never
/// surfaced to the submitting caller, which has already received an id.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{kind} error: {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transcription, message)
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Translation, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

/// Errors produced by the orchestration core itself. These resolve
/// synchronously at the API boundary; execution errors do not appear
/// here because they are observable only through status/result polling.
#[derive(Debug, Clone, Error)]
pub enum OrchestrationError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("invalid {task_type} request: {reason}")]
    Validation { task_type: TaskType, reason: String },

    #[error("task {id} is not completed (status: {status})")]
    ResultNotReady {
        id: TaskId,
        status: TaskStatus,
        /// Present when the task failed, so result-only pollers still
        /// learn the reason.
        error: Option<ExecutionError>,
    },

    #[error("no executor registered for task type '{0}'")]
    UnsupportedTaskType(TaskType),

    #[error("orchestrator is shutting down")]
    Shutdown,
}

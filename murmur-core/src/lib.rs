//! murmur-core – async task orchestration for media operations.
//!
//! The crate hosts the task registry, lifecycle state machine,
//! bounded-concurrency FIFO scheduler, cooperative cancellation, and the
//! [`TaskManager`] facade a server exposes over a polling API, plus the
//! LRC/SRT subtitle handling the executors share.

pub mod orchestration;
pub mod subtitle;

pub use orchestration::adapter::{CancelToken, Executor, ExecutorSet, ProgressHandle};
pub use orchestration::limiter::{RateLimitExceeded, RateLimitInfo, RateLimiter, GLOBAL_CLIENT_KEY};
pub use orchestration::manager::{ManagerSettings, RetentionPolicy, TaskManager};
pub use orchestration::types::{
    ErrorKind, ExecutionError, InputRef, LanguageCode, OrchestrationError, OutputFormat,
    TaskConfig, TaskId, TaskMetadata, TaskResult, TaskStatus, TaskType, TranscriptionConfig,
    TranscriptionResult, TranslationConfig, TranslationEntry, TranslationResult,
};
pub use orchestration::registry::{StatsSnapshot, TaskFilter, TaskSnapshot};
pub use subtitle::SubtitleEntry;

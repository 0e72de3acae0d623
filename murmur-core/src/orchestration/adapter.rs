use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::orchestration::registry::TaskRegistry;
use crate::orchestration::types::{
    ExecutionError, InputRef, TaskConfig, TaskId, TaskResult, TaskStatus, TaskType,
};

/// Cooperative cancellation handle passed into executors.
///
/// Executors are expected to call [`is_cancelled`](Self::is_cancelled)
/// between logically separable units of work (per subtitle entry, per
/// pipeline phase) and abort promptly. The core never forcibly kills an
/// in-flight external call, so actual termination is best-effort and may
/// lag the cancel request.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; for use in `select!`
    /// arms around non-checkpointable awaits (e.g. a child process).
    pub async fn cancelled(&mut self) {
        // An error means the task record was dropped; treat as cancel.
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Progress-reporting handle owned by the task's single active executor.
///
/// Reports are applied in order through the registry's atomic update;
/// progress is clamped so it never decreases, and reports arriving after
/// the task left `processing` are dropped.
#[derive(Clone)]
pub struct ProgressHandle {
    registry: TaskRegistry,
    task_id: TaskId,
}

impl ProgressHandle {
    pub(crate) fn new(registry: TaskRegistry, task_id: TaskId) -> Self {
        Self { registry, task_id }
    }

    pub async fn report(&self, fraction: f64, step: impl Into<String>) {
        let step = step.into();
        debug!(task_id = %self.task_id, fraction, step = %step, "progress");
        let _ = self
            .registry
            .update(self.task_id, |record| {
                if record.status == TaskStatus::Processing {
                    record.progress = record.progress.max(fraction.clamp(0.0, 1.0));
                    record.current_step = Some(step);
                }
            })
            .await;
    }
}

/// Uniform contract between the orchestration core and the external
/// transcription/translation collaborators.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(
        &self,
        input: InputRef,
        config: TaskConfig,
        progress: ProgressHandle,
        cancel: CancelToken,
    ) -> Result<TaskResult, ExecutionError>;
}

/// Executor lookup table, frozen before the manager starts.
#[derive(Clone, Default)]
pub struct ExecutorSet {
    executors: HashMap<TaskType, Arc<dyn Executor>>,
}

impl ExecutorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, task_type: TaskType, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(task_type, executor);
        self
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn Executor>> {
        self.executors.get(&task_type).cloned()
    }

    pub fn supports(&self, task_type: TaskType) -> bool {
        self.executors.contains_key(&task_type)
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::orchestration::adapter::ExecutorSet;
use crate::orchestration::registry::{StatsSnapshot, TaskFilter, TaskRegistry, TaskSnapshot};
use crate::orchestration::scheduler::Scheduler;
use crate::orchestration::types::{
    InputRef, OrchestrationError, TaskConfig, TaskId, TaskResult, TaskStatus,
};

/// TTL-based eviction of terminal tasks.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// How long terminal tasks stay queryable after their last mutation.
    pub ttl: Duration,
    /// How often the sweep runs.
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    pub max_concurrent_tasks: usize,
    /// `None` keeps every task in memory until process shutdown.
    pub retention: Option<RetentionPolicy>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            retention: Some(RetentionPolicy::default()),
        }
    }
}

/// The orchestration facade.
///
/// Owns the registry and the scheduler; every public operation returns
/// promptly regardless of queue depth. Submission never executes work
/// synchronously, and execution failures never propagate back to the
/// submitting caller — they are recorded on the task and observed by
/// polling.
pub struct TaskManager {
    registry: TaskRegistry,
    scheduler: Scheduler,
    executors: ExecutorSet,
    max_concurrent_tasks: usize,
}

impl TaskManager {
    /// Build the manager, spawn the dispatch loop and (if configured)
    /// the retention sweep.
    pub fn start(settings: ManagerSettings, executors: ExecutorSet) -> Arc<Self> {
        let registry = TaskRegistry::new();
        let scheduler = Scheduler::start(
            settings.max_concurrent_tasks,
            registry.clone(),
            executors.clone(),
        );

        if let Some(retention) = settings.retention {
            spawn_retention_sweep(registry.clone(), retention);
        }

        info!(
            max_concurrent_tasks = settings.max_concurrent_tasks,
            retention = ?settings.retention,
            "task manager started"
        );
        Arc::new(Self {
            registry,
            scheduler,
            executors,
            max_concurrent_tasks: settings.max_concurrent_tasks,
        })
    }

    /// Validate and create a task, then queue it for dispatch.
    ///
    /// Malformed requests fail here and leave no registry footprint;
    /// the caller gets back a `pending` snapshot otherwise.
    pub async fn submit(
        &self,
        config: TaskConfig,
        input: InputRef,
    ) -> Result<TaskSnapshot, OrchestrationError> {
        let task_type = config.task_type();
        if !self.executors.supports(task_type) {
            return Err(OrchestrationError::UnsupportedTaskType(task_type));
        }
        config.validate(&input)?;

        let snapshot = self.registry.create(config, input).await;
        if !self.scheduler.enqueue(snapshot.id) {
            // Dispatch loop is gone; mark the orphan so it never reads
            // as pending forever.
            let _ = self
                .registry
                .update(snapshot.id, |record| {
                    record.status = TaskStatus::Failed;
                    record.error = Some(crate::orchestration::types::ExecutionError::new(
                        crate::orchestration::types::ErrorKind::Internal,
                        "scheduler unavailable",
                    ));
                    record.completed_at = Some(Utc::now());
                })
                .await;
            return Err(OrchestrationError::Shutdown);
        }
        info!(task_id = %snapshot.id, task_type = %task_type, "task submitted");
        Ok(snapshot)
    }

    /// Status snapshot, including estimated time remaining while
    /// processing.
    pub async fn get_status(&self, id: TaskId) -> Result<TaskSnapshot, OrchestrationError> {
        self.registry
            .get(id)
            .await
            .ok_or(OrchestrationError::TaskNotFound(id))
    }

    /// The result of a completed task. Tasks in any other state yield
    /// [`OrchestrationError::ResultNotReady`]; callers are expected to
    /// poll status first. Results stay queryable until retention evicts
    /// the task.
    pub async fn get_result(&self, id: TaskId) -> Result<TaskResult, OrchestrationError> {
        let snapshot = self
            .registry
            .get(id)
            .await
            .ok_or(OrchestrationError::TaskNotFound(id))?;
        match (snapshot.status, snapshot.result) {
            (TaskStatus::Completed, Some(result)) => Ok(result),
            (status, _) => Err(OrchestrationError::ResultNotReady {
                id,
                status,
                error: snapshot.error,
            }),
        }
    }

    /// Request cancellation.
    ///
    /// A `pending` task is cancelled immediately and never dispatched.
    /// A `processing` task is reported `cancelled` immediately while the
    /// executor winds down cooperatively; any late result it produces is
    /// discarded. Cancelling an already-terminal task is a no-op that
    /// acks with the existing status.
    pub async fn cancel(&self, id: TaskId) -> Result<TaskSnapshot, OrchestrationError> {
        let current = self
            .registry
            .get(id)
            .await
            .ok_or(OrchestrationError::TaskNotFound(id))?;
        if current.status.is_terminal() {
            return Ok(current);
        }

        self.registry
            .update(id, |record| {
                if record.status.is_terminal() {
                    // Lost the race against finalization; keep the
                    // terminal outcome.
                    return;
                }
                let was_processing = record.status == TaskStatus::Processing;
                record.status = TaskStatus::Cancelled;
                record.cancel_requested = true;
                record.completed_at = Some(Utc::now());
                let _ = record.cancel_tx.send(true);
                if was_processing {
                    info!(task_id = %id, "cancelling in-flight task (best effort)");
                } else {
                    info!(task_id = %id, "cancelled queued task");
                }
            })
            .await?;

        self.registry
            .get(id)
            .await
            .ok_or(OrchestrationError::TaskNotFound(id))
    }

    /// Page through tasks in creation order.
    pub async fn list(
        &self,
        filter: TaskFilter,
        limit: usize,
        offset: usize,
    ) -> (Vec<TaskSnapshot>, usize) {
        self.registry.list(filter, limit, offset).await
    }

    /// Aggregate counters over the whole registry.
    pub async fn stats(&self) -> StatsSnapshot {
        self.registry.stats(self.max_concurrent_tasks).await
    }
}

fn spawn_retention_sweep(registry: TaskRegistry, retention: RetentionPolicy) {
    let Ok(ttl) = chrono::Duration::from_std(retention.ttl) else {
        warn!("retention TTL out of range; sweep disabled");
        return;
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retention.sweep_interval);
        // The first tick fires immediately; skip it so a fresh process
        // never sweeps before the interval has elapsed once.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = registry.evict_terminal_older_than(ttl).await;
            if evicted > 0 {
                info!(evicted, "evicted expired terminal tasks");
            }
        }
    });
}

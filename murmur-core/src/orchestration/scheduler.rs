use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::orchestration::adapter::{CancelToken, ExecutorSet, ProgressHandle};
use crate::orchestration::registry::TaskRegistry;
use crate::orchestration::types::{TaskId, TaskStatus};

/// Admission controller: bounds how many tasks execute concurrently and
/// dispatches queued tasks in strict creation (FIFO) order.
///
/// An unbounded queue feeds a single dispatch loop gated by a counting
/// semaphore of `max_concurrent_tasks` permits. The loop acquires a
/// permit *before* popping work, so the head of the queue is always the
/// next task dispatched and nothing behind it can jump the line.
/// Enqueueing never blocks the submitting caller; flow control against
/// floods is the rate limiter's job, upstream.
#[derive(Clone)]
pub struct Scheduler {
    queue_tx: mpsc::UnboundedSender<TaskId>,
}

impl Scheduler {
    /// Spawn the dispatch loop and return a handle for enqueueing.
    pub fn start(max_concurrent_tasks: usize, registry: TaskRegistry, executors: ExecutorSet) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(max_concurrent_tasks.max(1)));
        tokio::spawn(run_loop(queue_rx, semaphore, registry, executors));
        Self { queue_tx }
    }

    /// Queue a freshly created (`pending`) task for dispatch.
    pub fn enqueue(&self, task_id: TaskId) -> bool {
        self.queue_tx.send(task_id).is_ok()
    }
}

async fn run_loop(
    mut queue_rx: mpsc::UnboundedReceiver<TaskId>,
    semaphore: Arc<Semaphore>,
    registry: TaskRegistry,
    executors: ExecutorSet,
) {
    while let Some(task_id) = queue_rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed; bail out defensively.
            Err(_) => break,
        };

        // Transition pending → processing atomically. Tasks cancelled
        // while queued are no longer pending and are skipped here, so
        // their executor is never invoked.
        let dispatched = registry
            .update(task_id, |record| {
                if record.status != TaskStatus::Pending {
                    return false;
                }
                record.status = TaskStatus::Processing;
                record.started_at = Some(Utc::now());
                record.current_step = None;
                true
            })
            .await;
        match dispatched {
            Ok(true) => {}
            Ok(false) => {
                debug!(%task_id, "skipping task no longer pending");
                drop(permit);
                continue;
            }
            Err(_) => {
                warn!(%task_id, "queued task vanished from registry");
                drop(permit);
                continue;
            }
        }

        let snapshot = match registry.get(task_id).await {
            Some(s) => s,
            None => {
                drop(permit);
                continue;
            }
        };
        let executor = match executors.get(snapshot.task_type) {
            Some(e) => e,
            None => {
                // Submission validates executor availability; reaching
                // this point means the set changed underneath us.
                error!(%task_id, task_type = %snapshot.task_type, "no executor registered");
                let _ = registry
                    .update(task_id, |record| {
                        if record.status == TaskStatus::Processing {
                            record.status = TaskStatus::Failed;
                            record.error = Some(crate::orchestration::types::ExecutionError::new(
                                crate::orchestration::types::ErrorKind::Internal,
                                format!("no executor registered for '{}'", record.task_type),
                            ));
                            record.completed_at = Some(Utc::now());
                        }
                    })
                    .await;
                drop(permit);
                continue;
            }
        };

        info!(%task_id, task_type = %snapshot.task_type, "task dispatched");
        let task_registry = registry.clone();
        tokio::spawn(async move {
            // Held for the full executor run; dropping it frees the
            // concurrency slot for the next queued task.
            let _permit = permit;
            execute_task(task_registry, executor, task_id).await;
        });
    }
}

/// Run the executor for one dispatched task and finalize the record.
async fn execute_task(
    registry: TaskRegistry,
    executor: Arc<dyn crate::orchestration::adapter::Executor>,
    task_id: TaskId,
) {
    let Some(cancel_rx) = registry.cancel_signal(task_id).await else {
        return;
    };
    let Some((input, config)) = registry.input_and_config(task_id).await else {
        return;
    };

    let progress = ProgressHandle::new(registry.clone(), task_id);
    let cancel = CancelToken::new(cancel_rx);
    let outcome = executor.run(input, config, progress, cancel).await;

    // Finalize. A task cancelled mid-flight is already terminal here;
    // its late outcome is discarded rather than written back.
    let finalized = registry
        .update(task_id, move |record| {
            if record.status != TaskStatus::Processing {
                return false;
            }
            match outcome {
                Ok(result) => {
                    record.status = TaskStatus::Completed;
                    record.progress = 1.0;
                    record.result = Some(result);
                }
                Err(error) => {
                    record.status = TaskStatus::Failed;
                    record.error = Some(error);
                }
            }
            record.completed_at = Some(Utc::now());
            true
        })
        .await;

    match finalized {
        Ok(true) => {
            if let Some(s) = registry.get(task_id).await {
                info!(%task_id, status = %s.status, "task finalized");
            }
        }
        Ok(false) => debug!(%task_id, "discarded late executor outcome for terminal task"),
        Err(_) => warn!(%task_id, "task evicted before finalization"),
    }
}

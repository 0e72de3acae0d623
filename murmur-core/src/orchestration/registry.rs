use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::sync::{watch, RwLock};

use crate::orchestration::types::{
    ExecutionError, InputRef, OrchestrationError, TaskConfig, TaskId, TaskResult, TaskStatus,
    TaskType,
};

/// Pagination bounds for [`TaskRegistry::list`].
pub const LIST_LIMIT_MIN: usize = 1;
pub const LIST_LIMIT_MAX: usize = 1000;

/// The complete in-memory record for a single task.
///
/// Mutated only through [`TaskRegistry::update`]; no component holds a
/// direct reference to a record.
#[derive(Debug)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Fraction in [0.0, 1.0]; monotonically non-decreasing while
    /// the task is `processing`.
    pub progress: f64,
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input: InputRef,
    pub config: TaskConfig,
    /// `Some` only when `status == Completed`.
    pub result: Option<TaskResult>,
    /// `Some` only when `status == Failed`.
    pub error: Option<ExecutionError>,
    pub cancel_requested: bool,
    /// Cancellation signal observed cooperatively by the executor.
    pub(crate) cancel_tx: Arc<watch::Sender<bool>>,
}

/// A read-only, cloneable view of a task returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: f64,
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds, extrapolated from elapsed time and progress; present
    /// only while `processing` with nonzero progress.
    pub estimated_time_remaining: Option<f64>,
    pub result: Option<TaskResult>,
    pub error: Option<ExecutionError>,
    pub cancel_requested: bool,
}

impl TaskRecord {
    fn snapshot(&self, now: DateTime<Utc>) -> TaskSnapshot {
        let estimated_time_remaining = match (self.status, self.started_at) {
            (TaskStatus::Processing, Some(started)) if self.progress > 0.0 => {
                let elapsed = (now - started).num_milliseconds() as f64 / 1000.0;
                Some((elapsed / self.progress * (1.0 - self.progress)).max(0.0))
            }
            _ => None,
        };
        TaskSnapshot {
            id: self.id,
            task_type: self.task_type,
            status: self.status,
            progress: self.progress,
            current_step: self.current_step.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            estimated_time_remaining,
            result: self.result.clone(),
            error: self.error.clone(),
            cancel_requested: self.cancel_requested,
        }
    }
}

/// Optional predicates for [`TaskRegistry::list`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    fn matches(&self, record: &TaskRecord) -> bool {
        self.task_type.is_none_or(|t| record.task_type == t)
            && self.status.is_none_or(|s| record.status == s)
    }
}

/// Aggregate counters over the full registry, internally consistent:
/// the status counts always sum to `total_tasks`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_tasks: usize,
    /// `pending` + `processing`.
    pub active_tasks: usize,
    pub max_concurrent_tasks: usize,
    pub status_counts: BTreeMap<TaskStatus, usize>,
    pub task_type_counts: BTreeMap<TaskType, usize>,
}

struct RegistryInner {
    records: HashMap<TaskId, TaskRecord>,
    /// Task ids in creation order; drives FIFO dispatch ordering and
    /// deterministic pagination.
    order: Vec<TaskId>,
}

/// The canonical in-memory task store.
///
/// A `tokio::sync::RwLock<HashMap>` lets many API readers observe task
/// state concurrently while executors and the scheduler write through
/// atomic [`update`](Self::update) calls.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                records: HashMap::new(),
                order: Vec::new(),
            })),
        }
    }

    /// Allocate a new id and insert a `pending` record.
    pub async fn create(&self, config: TaskConfig, input: InputRef) -> TaskSnapshot {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4();
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let record = TaskRecord {
            id,
            task_type: config.task_type(),
            status: TaskStatus::Pending,
            progress: 0.0,
            current_step: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            input,
            config,
            result: None,
            error: None,
            cancel_requested: false,
            cancel_tx: Arc::new(cancel_tx),
        };
        let snapshot = record.snapshot(now);

        let mut guard = self.inner.write().await;
        guard.order.push(id);
        guard.records.insert(id, record);
        snapshot
    }

    pub async fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        let guard = self.inner.read().await;
        guard.records.get(&id).map(|r| r.snapshot(Utc::now()))
    }

    /// Atomic read-modify-write on a single record. The mutator runs
    /// under the write lock, so no concurrent update is ever lost;
    /// `updated_at` is refreshed afterwards.
    pub async fn update<R>(
        &self,
        id: TaskId,
        mutate: impl FnOnce(&mut TaskRecord) -> R,
    ) -> Result<R, OrchestrationError> {
        let mut guard = self.inner.write().await;
        let record = guard
            .records
            .get_mut(&id)
            .ok_or(OrchestrationError::TaskNotFound(id))?;
        let out = mutate(record);
        record.updated_at = Utc::now();
        Ok(out)
    }

    /// Read the frozen input handle and config for dispatch.
    pub async fn input_and_config(&self, id: TaskId) -> Option<(InputRef, TaskConfig)> {
        let guard = self.inner.read().await;
        guard
            .records
            .get(&id)
            .map(|r| (r.input.clone(), r.config.clone()))
    }

    /// Subscribe to the task's cancellation signal.
    pub async fn cancel_signal(&self, id: TaskId) -> Option<watch::Receiver<bool>> {
        let guard = self.inner.read().await;
        guard.records.get(&id).map(|r| r.cancel_tx.subscribe())
    }

    /// List tasks in creation order. `limit` is clamped to
    /// [1, 1000]; an out-of-range `offset` yields an empty page, never
    /// an error. Returns the page and the total number of matches.
    pub async fn list(
        &self,
        filter: TaskFilter,
        limit: usize,
        offset: usize,
    ) -> (Vec<TaskSnapshot>, usize) {
        let limit = limit.clamp(LIST_LIMIT_MIN, LIST_LIMIT_MAX);
        let now = Utc::now();
        let guard = self.inner.read().await;

        let matching: Vec<&TaskRecord> = guard
            .order
            .iter()
            .filter_map(|id| guard.records.get(id))
            .filter(|r| filter.matches(r))
            .collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| r.snapshot(now))
            .collect();
        (page, total)
    }

    /// Remove a record. Used only by the retention sweep; refuses to
    /// drop a task that is still pending or processing.
    pub async fn delete(&self, id: TaskId) -> bool {
        let mut guard = self.inner.write().await;
        let terminal = guard
            .records
            .get(&id)
            .is_some_and(|r| r.status.is_terminal());
        if !terminal {
            return false;
        }
        guard.records.remove(&id);
        guard.order.retain(|t| *t != id);
        true
    }

    /// Evict terminal tasks whose last mutation is older than `ttl`.
    /// Returns the number of evicted tasks.
    pub async fn evict_terminal_older_than(&self, ttl: chrono::Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut guard = self.inner.write().await;
        let expired: Vec<TaskId> = guard
            .records
            .values()
            .filter(|r| r.status.is_terminal() && r.updated_at < cutoff)
            .map(|r| r.id)
            .collect();
        for id in &expired {
            guard.records.remove(id);
        }
        if !expired.is_empty() {
            guard.order.retain(|id| !expired.contains(id));
        }
        expired.len()
    }

    /// One consistent pass over the whole registry.
    pub async fn stats(&self, max_concurrent_tasks: usize) -> StatsSnapshot {
        let guard = self.inner.read().await;

        let mut status_counts: BTreeMap<TaskStatus, usize> =
            TaskStatus::iter().map(|s| (s, 0)).collect();
        let mut task_type_counts: BTreeMap<TaskType, usize> =
            TaskType::iter().map(|t| (t, 0)).collect();
        for record in guard.records.values() {
            *status_counts.entry(record.status).or_default() += 1;
            *task_type_counts.entry(record.task_type).or_default() += 1;
        }
        let active_tasks = status_counts[&TaskStatus::Pending]
            + status_counts[&TaskStatus::Processing];

        StatsSnapshot {
            total_tasks: guard.records.len(),
            active_tasks,
            max_concurrent_tasks,
            status_counts,
            task_type_counts,
        }
    }
}

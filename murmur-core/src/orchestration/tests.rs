#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::sync::{mpsc, Semaphore};

    use crate::orchestration::adapter::{CancelToken, Executor, ExecutorSet, ProgressHandle};
    use crate::orchestration::limiter::{RateLimiter, GLOBAL_CLIENT_KEY};
    use crate::orchestration::manager::{ManagerSettings, RetentionPolicy, TaskManager};
    use crate::orchestration::registry::TaskFilter;
    use crate::orchestration::types::{
        ErrorKind, ExecutionError, InputRef, LanguageCode, OrchestrationError, OutputFormat,
        TaskConfig, TaskId, TaskMetadata, TaskResult, TaskStatus, TaskType, TranscriptionConfig,
        TranscriptionResult, TranslationConfig,
    };

    // ── Test harness ─────────────────────────────────────────────────────────

    /// Adapter turning a boxed-future closure into an [`Executor`].
    struct FnExecutor<F>(F);

    #[async_trait::async_trait]
    impl<F> Executor for FnExecutor<F>
    where
        F: Fn(
                InputRef,
                TaskConfig,
                ProgressHandle,
                CancelToken,
            ) -> BoxFuture<'static, Result<TaskResult, ExecutionError>>
            + Send
            + Sync,
    {
        async fn run(
            &self,
            input: InputRef,
            config: TaskConfig,
            progress: ProgressHandle,
            cancel: CancelToken,
        ) -> Result<TaskResult, ExecutionError> {
            (self.0)(input, config, progress, cancel).await
        }
    }

    fn dummy_result() -> TaskResult {
        TaskResult::Transcription(TranscriptionResult {
            entries: Vec::new(),
            content: String::new(),
            format: OutputFormat::Lrc,
            metadata: TaskMetadata::default(),
        })
    }

    /// Marker string smuggled through the input so tests can tell which
    /// task an executor invocation belongs to.
    fn marker(input: &InputRef) -> String {
        match input {
            InputRef::Url(u) => u.clone(),
            InputRef::Path(p) => p.display().to_string(),
            InputRef::Inline(s) => s.clone(),
        }
    }

    fn transcription_config() -> TaskConfig {
        TaskConfig::Transcription(TranscriptionConfig::default())
    }

    fn translation_config() -> TaskConfig {
        TaskConfig::Translation(TranslationConfig {
            target_language: LanguageCode::ChineseSimplified,
            translator: None,
        })
    }

    fn translation_input(tag: &str) -> InputRef {
        InputRef::Inline(format!("[00:01.00]{tag}"))
    }

    /// An executor set whose runs block until a release token is added,
    /// reporting each started task's marker on `started_tx`.
    fn gated_executors(
        started_tx: mpsc::UnboundedSender<String>,
        release: Arc<Semaphore>,
    ) -> ExecutorSet {
        let executor = Arc::new(FnExecutor(move |input, _config, _progress, _cancel| {
            let started_tx = started_tx.clone();
            let release = Arc::clone(&release);
            Box::pin(async move {
                let _ = started_tx.send(marker(&input));
                release
                    .acquire()
                    .await
                    .expect("release semaphore closed")
                    .forget();
                Ok(dummy_result())
            }) as BoxFuture<'static, _>
        }));
        ExecutorSet::new()
            .register(TaskType::Transcription, executor.clone())
            .register(TaskType::Translation, executor)
    }

    /// An executor set whose runs complete immediately.
    fn instant_executors() -> ExecutorSet {
        let executor = Arc::new(FnExecutor(|_input, _config, _progress, _cancel| {
            Box::pin(async { Ok(dummy_result()) }) as BoxFuture<'static, _>
        }));
        ExecutorSet::new()
            .register(TaskType::Transcription, executor.clone())
            .register(TaskType::Translation, executor)
    }

    fn settings(max_concurrent_tasks: usize) -> ManagerSettings {
        ManagerSettings {
            max_concurrent_tasks,
            retention: None,
        }
    }

    async fn wait_for_status(
        manager: &TaskManager,
        id: TaskId,
        status: TaskStatus,
    ) -> crate::orchestration::registry::TaskSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = manager.get_status(id).await.expect("task should exist");
                if snapshot.status == status {
                    break snapshot;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("task {id} never reached {status}"))
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn submit_returns_pending_and_task_completes() {
        let manager = TaskManager::start(settings(2), instant_executors());
        let snapshot = manager
            .submit(transcription_config(), InputRef::Url("file-a".into()))
            .await
            .expect("submit should succeed");
        assert_eq!(snapshot.status, TaskStatus::Pending);
        assert_eq!(snapshot.progress, 0.0);

        let done = wait_for_status(&manager, snapshot.id, TaskStatus::Completed).await;
        assert_eq!(done.progress, 1.0);
        assert!(done.result.is_some());
        assert!(done.error.is_none());
        assert!(done.completed_at.is_some());

        let result = manager.get_result(snapshot.id).await.expect("result ready");
        assert!(matches!(result, TaskResult::Transcription(_)));
    }

    #[tokio::test]
    async fn capacity_bounds_processing_and_dispatch_is_fifo() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(2), gated_executors(started_tx, release.clone()));

        let mut ids = Vec::new();
        for i in 0..4 {
            let snap = manager
                .submit(transcription_config(), InputRef::Url(format!("t{i}")))
                .await
                .expect("submit");
            ids.push(snap.id);
        }

        // Exactly the first two dispatch, in creation order.
        assert_eq!(started_rx.recv().await.as_deref(), Some("t0"));
        assert_eq!(started_rx.recv().await.as_deref(), Some("t1"));
        wait_for_status(&manager, ids[0], TaskStatus::Processing).await;
        wait_for_status(&manager, ids[1], TaskStatus::Processing).await;
        assert_eq!(
            manager.get_status(ids[2]).await.unwrap().status,
            TaskStatus::Pending
        );
        assert_eq!(
            manager.get_status(ids[3]).await.unwrap().status,
            TaskStatus::Pending
        );

        let stats = manager.stats().await;
        assert_eq!(stats.active_tasks, 4);
        assert_eq!(stats.status_counts[&TaskStatus::Processing], 2);
        assert_eq!(stats.status_counts[&TaskStatus::Pending], 2);

        // Freeing one slot promotes the oldest pending task.
        release.add_permits(1);
        assert_eq!(started_rx.recv().await.as_deref(), Some("t2"));
        wait_for_status(&manager, ids[2], TaskStatus::Processing).await;
        assert_eq!(
            manager.get_status(ids[3]).await.unwrap().status,
            TaskStatus::Pending
        );

        release.add_permits(3);
        for id in ids {
            wait_for_status(&manager, id, TaskStatus::Completed).await;
        }
    }

    #[tokio::test]
    async fn mixed_task_types_share_the_same_fifo_queue() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(1), gated_executors(started_tx, release.clone()));

        let a = manager
            .submit(transcription_config(), InputRef::Url("a".into()))
            .await
            .expect("submit a");
        let b = manager
            .submit(translation_config(), translation_input("b"))
            .await
            .expect("submit b");

        assert_eq!(started_rx.recv().await.as_deref(), Some("a"));
        wait_for_status(&manager, a.id, TaskStatus::Processing).await;
        assert_eq!(
            manager.get_status(b.id).await.unwrap().status,
            TaskStatus::Pending
        );

        release.add_permits(1);
        wait_for_status(&manager, a.id, TaskStatus::Completed).await;
        assert_eq!(started_rx.recv().await.unwrap(), "[00:01.00]b");
        wait_for_status(&manager, b.id, TaskStatus::Processing).await;

        release.add_permits(1);
        wait_for_status(&manager, b.id, TaskStatus::Completed).await;
    }

    // ── Cancellation ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn cancelling_pending_task_skips_dispatch_entirely() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(1), gated_executors(started_tx, release.clone()));

        let blocker = manager
            .submit(transcription_config(), InputRef::Url("blocker".into()))
            .await
            .expect("submit blocker");
        let victim = manager
            .submit(transcription_config(), InputRef::Url("victim".into()))
            .await
            .expect("submit victim");
        assert_eq!(started_rx.recv().await.as_deref(), Some("blocker"));

        let ack = manager.cancel(victim.id).await.expect("cancel");
        assert_eq!(ack.status, TaskStatus::Cancelled);
        assert!(ack.cancel_requested);

        release.add_permits(1);
        wait_for_status(&manager, blocker.id, TaskStatus::Completed).await;

        // Give the dispatch loop a chance to (wrongly) start the victim.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            started_rx.try_recv().is_err(),
            "cancelled pending task must never reach an executor"
        );
        assert_eq!(
            manager.get_status(victim.id).await.unwrap().status,
            TaskStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn cancelling_processing_task_reports_immediately_and_discards_late_result() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(1), gated_executors(started_tx, release.clone()));

        let task = manager
            .submit(transcription_config(), InputRef::Url("slow".into()))
            .await
            .expect("submit");
        assert_eq!(started_rx.recv().await.as_deref(), Some("slow"));
        wait_for_status(&manager, task.id, TaskStatus::Processing).await;

        // The executor is still blocked; the registry must report
        // cancelled without waiting for it.
        let ack = manager.cancel(task.id).await.expect("cancel");
        assert_eq!(ack.status, TaskStatus::Cancelled);

        // Let the executor finish with a (now stale) success.
        release.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = manager.get_status(task.id).await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Cancelled);
        assert!(snapshot.result.is_none(), "late result must be discarded");
        assert!(matches!(
            manager.get_result(task.id).await,
            Err(OrchestrationError::ResultNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn executor_observes_cancel_token() {
        let executor = Arc::new(FnExecutor(|_input, _config, _progress, mut cancel: CancelToken| {
            Box::pin(async move {
                cancel.cancelled().await;
                Err(ExecutionError::new(ErrorKind::Internal, "interrupted"))
            }) as BoxFuture<'static, _>
        }));
        let executors = ExecutorSet::new().register(TaskType::Transcription, executor);
        let manager = TaskManager::start(settings(1), executors);

        let task = manager
            .submit(transcription_config(), InputRef::Url("x".into()))
            .await
            .expect("submit");
        wait_for_status(&manager, task.id, TaskStatus::Processing).await;

        manager.cancel(task.id).await.expect("cancel");
        // The executor's error return races the cancel; the terminal
        // status must stay cancelled either way.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = manager.get_status(task.id).await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Cancelled);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn cancelling_terminal_task_is_a_noop_ack() {
        let manager = TaskManager::start(settings(1), instant_executors());
        let task = manager
            .submit(transcription_config(), InputRef::Url("done".into()))
            .await
            .expect("submit");
        wait_for_status(&manager, task.id, TaskStatus::Completed).await;

        let ack = manager.cancel(task.id).await.expect("cancel is not an error");
        assert_eq!(ack.status, TaskStatus::Completed);
        assert!(!ack.cancel_requested);
        // And the result is still there.
        assert!(manager.get_result(task.id).await.is_ok());
    }

    // ── Failures & wrong-state ───────────────────────────────────────────────

    #[tokio::test]
    async fn failed_task_keeps_error_progress_and_step() {
        let executor = Arc::new(FnExecutor(|_input, _config, progress: ProgressHandle, _cancel| {
            Box::pin(async move {
                progress.report(0.4, "Transcribing audio").await;
                Err(ExecutionError::transcription("model exploded"))
            }) as BoxFuture<'static, _>
        }));
        let executors = ExecutorSet::new().register(TaskType::Transcription, executor);
        let manager = TaskManager::start(settings(1), executors);

        let task = manager
            .submit(transcription_config(), InputRef::Url("x".into()))
            .await
            .expect("submit");
        let failed = wait_for_status(&manager, task.id, TaskStatus::Failed).await;

        let error = failed.error.expect("error recorded");
        assert_eq!(error.kind, ErrorKind::Transcription);
        assert_eq!(error.message, "model exploded");
        assert_eq!(failed.progress, 0.4);
        assert_eq!(failed.current_step.as_deref(), Some("Transcribing audio"));
        assert!(failed.result.is_none());

        // Result polling surfaces the failure through WrongState.
        match manager.get_result(task.id).await {
            Err(OrchestrationError::ResultNotReady { status, error, .. }) => {
                assert_eq!(status, TaskStatus::Failed);
                assert_eq!(error.expect("error attached").kind, ErrorKind::Transcription);
            }
            other => panic!("expected ResultNotReady, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_before_completion_is_wrong_state_not_empty() {
        let (started_tx, _started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(1), gated_executors(started_tx, release.clone()));

        let blocker = manager
            .submit(transcription_config(), InputRef::Url("blocker".into()))
            .await
            .expect("submit");
        let queued = manager
            .submit(transcription_config(), InputRef::Url("queued".into()))
            .await
            .expect("submit");

        match manager.get_result(queued.id).await {
            Err(OrchestrationError::ResultNotReady { status, .. }) => {
                assert_eq!(status, TaskStatus::Pending);
            }
            other => panic!("expected ResultNotReady, got {other:?}"),
        }

        release.add_permits(2);
        wait_for_status(&manager, blocker.id, TaskStatus::Completed).await;
        wait_for_status(&manager, queued.id, TaskStatus::Completed).await;
    }

    #[tokio::test]
    async fn unknown_ids_yield_not_found() {
        let manager = TaskManager::start(settings(1), instant_executors());
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            manager.get_status(id).await,
            Err(OrchestrationError::TaskNotFound(_))
        ));
        assert!(matches!(
            manager.get_result(id).await,
            Err(OrchestrationError::TaskNotFound(_))
        ));
        assert!(matches!(
            manager.cancel(id).await,
            Err(OrchestrationError::TaskNotFound(_))
        ));
    }

    // ── Validation ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn invalid_submissions_leave_no_registry_footprint() {
        let manager = TaskManager::start(settings(1), instant_executors());

        // Empty LRC content.
        let err = manager
            .submit(translation_config(), InputRef::Inline("  ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation { .. }));

        // Content without any timestamped line.
        let err = manager
            .submit(translation_config(), InputRef::Inline("plain text".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation { .. }));

        // Japanese → Japanese.
        let config = TaskConfig::Translation(TranslationConfig {
            target_language: LanguageCode::Japanese,
            translator: None,
        });
        let err = manager
            .submit(config, translation_input("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation { .. }));

        // Transcription cannot take inline text.
        let err = manager
            .submit(transcription_config(), InputRef::Inline("lrc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation { .. }));

        assert_eq!(manager.stats().await.total_tasks, 0);
    }

    #[tokio::test]
    async fn submit_without_registered_executor_is_rejected() {
        let executors = ExecutorSet::new().register(
            TaskType::Transcription,
            Arc::new(FnExecutor(|_i, _c, _p, _t| {
                Box::pin(async { Ok(dummy_result()) }) as BoxFuture<'static, _>
            })),
        );
        let manager = TaskManager::start(settings(1), executors);
        let err = manager
            .submit(translation_config(), translation_input("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::UnsupportedTaskType(TaskType::Translation)
        ));
    }

    // ── Listing & stats ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_pages_in_creation_order() {
        let manager = TaskManager::start(settings(4), instant_executors());
        let mut ids = Vec::new();
        for i in 0..3 {
            let snap = manager
                .submit(transcription_config(), InputRef::Url(format!("t{i}")))
                .await
                .expect("submit");
            ids.push(snap.id);
        }
        for id in &ids {
            wait_for_status(&manager, *id, TaskStatus::Completed).await;
        }

        let (page, total) = manager.list(TaskFilter::default(), 1, 1).await;
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[1], "limit=1 offset=1 is the second-oldest");

        // limit is clamped up to 1, offset past the end is empty.
        let (page, total) = manager.list(TaskFilter::default(), 0, 0).await;
        assert_eq!((page.len(), total), (1, 3));
        let (page, total) = manager.list(TaskFilter::default(), 10, 99).await;
        assert_eq!((page.len(), total), (0, 3));
    }

    #[tokio::test]
    async fn list_filters_by_type_and_status() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(1), gated_executors(started_tx, release.clone()));

        let tr = manager
            .submit(transcription_config(), InputRef::Url("a".into()))
            .await
            .expect("submit");
        let tl = manager
            .submit(translation_config(), translation_input("b"))
            .await
            .expect("submit");
        assert_eq!(started_rx.recv().await.as_deref(), Some("a"));
        wait_for_status(&manager, tr.id, TaskStatus::Processing).await;

        let filter = TaskFilter {
            task_type: Some(TaskType::Translation),
            status: None,
        };
        let (page, total) = manager.list(filter, 100, 0).await;
        assert_eq!(total, 1);
        assert_eq!(page[0].id, tl.id);

        let filter = TaskFilter {
            task_type: None,
            status: Some(TaskStatus::Processing),
        };
        let (page, _) = manager.list(filter, 100, 0).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, tr.id);

        release.add_permits(2);
        wait_for_status(&manager, tl.id, TaskStatus::Completed).await;
    }

    #[tokio::test]
    async fn stats_counts_are_internally_consistent() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let manager = TaskManager::start(settings(1), gated_executors(started_tx, release.clone()));

        let a = manager
            .submit(transcription_config(), InputRef::Url("a".into()))
            .await
            .expect("submit");
        let _b = manager
            .submit(translation_config(), translation_input("b"))
            .await
            .expect("submit");
        let c = manager
            .submit(transcription_config(), InputRef::Url("c".into()))
            .await
            .expect("submit");
        assert_eq!(started_rx.recv().await.as_deref(), Some("a"));
        wait_for_status(&manager, a.id, TaskStatus::Processing).await;
        manager.cancel(c.id).await.expect("cancel");

        let stats = manager.stats().await;
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.active_tasks, 2);
        assert_eq!(stats.status_counts.values().sum::<usize>(), stats.total_tasks);
        assert_eq!(stats.task_type_counts[&TaskType::Transcription], 2);
        assert_eq!(stats.task_type_counts[&TaskType::Translation], 1);
        assert_eq!(stats.max_concurrent_tasks, 1);
    }

    // ── Progress & ETA ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn progress_is_monotonic_and_clamped() {
        let (probe_tx, mut probe_rx) = mpsc::unbounded_channel::<()>();
        let release = Arc::new(Semaphore::new(0));
        let release_exec = Arc::clone(&release);
        let executor = Arc::new(FnExecutor(move |_input, _config, progress: ProgressHandle, _cancel| {
            let probe_tx = probe_tx.clone();
            let release = Arc::clone(&release_exec);
            Box::pin(async move {
                progress.report(0.8, "far along").await;
                // Stale, lower report must not rewind progress; an
                // out-of-range one must clamp.
                progress.report(0.3, "stale report").await;
                progress.report(1.7, "overshoot").await;
                let _ = probe_tx.send(());
                release.acquire().await.expect("release").forget();
                Ok(dummy_result())
            }) as BoxFuture<'static, _>
        }));
        let executors = ExecutorSet::new().register(TaskType::Transcription, executor);
        let manager = TaskManager::start(settings(1), executors);

        let task = manager
            .submit(transcription_config(), InputRef::Url("p".into()))
            .await
            .expect("submit");
        probe_rx.recv().await.expect("executor reported");

        let snapshot = manager.get_status(task.id).await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Processing);
        assert_eq!(snapshot.progress, 1.0, "0.8 → max(0.3) → clamp(1.7) = 1.0");

        release.add_permits(1);
        wait_for_status(&manager, task.id, TaskStatus::Completed).await;
    }

    #[tokio::test]
    async fn eta_is_present_only_while_processing_with_progress() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Semaphore::new(0));
        let release_exec = Arc::clone(&release);
        let executor = Arc::new(FnExecutor(move |input, _config, progress: ProgressHandle, _cancel| {
            let started_tx = started_tx.clone();
            let release = Arc::clone(&release_exec);
            Box::pin(async move {
                progress.report(0.5, "halfway").await;
                let _ = started_tx.send(marker(&input));
                release.acquire().await.expect("release").forget();
                Ok(dummy_result())
            }) as BoxFuture<'static, _>
        }));
        let executors = ExecutorSet::new().register(TaskType::Transcription, executor);
        let manager = TaskManager::start(settings(1), executors);

        let task = manager
            .submit(transcription_config(), InputRef::Url("eta".into()))
            .await
            .expect("submit");
        assert!(task.estimated_time_remaining.is_none(), "no ETA while pending");

        started_rx.recv().await.expect("executor started");
        let snapshot = manager.get_status(task.id).await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Processing);
        assert!(snapshot.estimated_time_remaining.is_some());
        assert!(snapshot.estimated_time_remaining.unwrap() >= 0.0);

        release.add_permits(1);
        let done = wait_for_status(&manager, task.id, TaskStatus::Completed).await;
        assert!(done.estimated_time_remaining.is_none(), "no ETA once terminal");
    }

    // ── Retention ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn retention_sweep_evicts_only_expired_terminal_tasks() {
        let settings = ManagerSettings {
            max_concurrent_tasks: 1,
            retention: Some(RetentionPolicy {
                ttl: Duration::ZERO,
                sweep_interval: Duration::from_millis(20),
            }),
        };
        let manager = TaskManager::start(settings, instant_executors());
        let task = manager
            .submit(transcription_config(), InputRef::Url("ephemeral".into()))
            .await
            .expect("submit");
        wait_for_status(&manager, task.id, TaskStatus::Completed).await;

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if matches!(
                    manager.get_status(task.id).await,
                    Err(OrchestrationError::TaskNotFound(_))
                ) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("terminal task should be evicted");
        assert_eq!(manager.stats().await.total_tasks, 0);
    }

    // ── Rate limiter ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn fixed_window_quota_and_full_reset() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        let first = limiter.check("client-a").expect("first admitted");
        assert_eq!(first.limit, 2);
        assert_eq!(first.remaining, 1);
        let second = limiter.check("client-a").expect("second admitted");
        assert_eq!(second.remaining, 0);

        let denied = limiter.check("client-a").expect_err("third rejected");
        assert_eq!(denied.info.remaining, 0);
        assert!(denied.retry_after_secs >= 1);

        // Partial elapse does not reset anything.
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("client-a").expect_err("still inside window");

        // After the window elapses the quota resets fully.
        tokio::time::advance(Duration::from_secs(30)).await;
        let after = limiter.check("client-a").expect("window reset");
        assert_eq!(after.remaining, 1);
        limiter.check("client-a").expect("full quota restored");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_windows_are_per_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check("client-a").expect("a admitted");
        limiter.check("client-b").expect("b has its own window");
        limiter.check(GLOBAL_CLIENT_KEY).expect("global key too");
        limiter.check("client-a").expect_err("a exhausted");
    }
}

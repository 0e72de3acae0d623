//! Speech-to-text executor backed by an external whisper-style command.
//!
//! The configured command is invoked as
//! `<command> -l <language> -f <audio path>` and must print LRC lines to
//! stdout. Remote URLs are downloaded to the work directory first and
//! removed afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use murmur_core::subtitle;
use murmur_core::{
    CancelToken, ExecutionError, Executor, InputRef, ProgressHandle, TaskConfig, TaskMetadata,
    TaskResult, TranscriptionResult,
};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;

pub struct TranscriptionExecutor {
    command: String,
    model: Option<String>,
    work_dir: PathBuf,
    http: reqwest::Client,
}

impl TranscriptionExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            command: config.whisper_command.clone(),
            model: config.whisper_model.clone(),
            work_dir: config.work_dir.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch a remote audio file into the work directory.
    async fn download(&self, url: &str) -> Result<PathBuf, ExecutionError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExecutionError::input(format!("failed to fetch '{url}': {e}")))?;
        if !response.status().is_success() {
            return Err(ExecutionError::input(format!(
                "failed to fetch '{url}': HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExecutionError::input(format!("failed to read '{url}': {e}")))?;

        let path = self.work_dir.join(format!("murmur-{}.audio", Uuid::new_v4()));
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "audio downloaded");
        Ok(path)
    }

    /// Run the transcription command, killing it if the task is
    /// cancelled mid-flight.
    async fn run_command(
        &self,
        audio_path: &Path,
        language: &str,
        cancel: &mut CancelToken,
    ) -> Result<String, ExecutionError> {
        let mut child = Command::new(&self.command)
            .arg("-l")
            .arg(language)
            .arg("-f")
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecutionError::transcription(format!(
                    "failed to spawn '{}': {e}",
                    self.command
                ))
            })?;

        // Drain stdout concurrently so a chatty child cannot fill the
        // pipe and deadlock against `wait`.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::transcription("child stdout unavailable"))?;
        let reader = tokio::spawn(async move {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).await.map(|_| buf)
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill transcription process");
                }
                return Err(ExecutionError::transcription(
                    "transcription aborted by cancellation",
                ));
            }
        };

        let output = match reader.await {
            Ok(Ok(buf)) => buf,
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => {
                return Err(ExecutionError::transcription(format!(
                    "stdout reader failed: {e}"
                )));
            }
        };

        if !status.success() {
            return Err(ExecutionError::transcription(format!(
                "'{}' exited with {status}",
                self.command
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl Executor for TranscriptionExecutor {
    async fn run(
        &self,
        input: InputRef,
        config: TaskConfig,
        progress: ProgressHandle,
        mut cancel: CancelToken,
    ) -> Result<TaskResult, ExecutionError> {
        let TaskConfig::Transcription(cfg) = config else {
            return Err(ExecutionError::input("expected a transcription config"));
        };
        let started = Instant::now();

        progress.report(0.05, "Preparing audio file").await;
        let (audio_path, downloaded) = match input {
            InputRef::Path(path) => (path, false),
            InputRef::Url(url) => (self.download(&url).await?, true),
            InputRef::Inline(_) => {
                return Err(ExecutionError::input(
                    "transcription input must be a file path or a media URL",
                ));
            }
        };
        if cancel.is_cancelled() {
            cleanup(downloaded, &audio_path).await;
            return Err(ExecutionError::transcription(
                "transcription aborted by cancellation",
            ));
        }

        progress.report(0.2, "Transcribing audio").await;
        let command_output = self
            .run_command(&audio_path, &cfg.language, &mut cancel)
            .await;
        cleanup(downloaded, &audio_path).await;
        let command_output = command_output?;

        progress.report(0.9, "Processing results").await;
        let entries = subtitle::parse_lrc(&command_output);
        if entries.is_empty() {
            return Err(ExecutionError::transcription(
                "transcriber produced no timestamped lines",
            ));
        }
        let content = subtitle::render(&entries, cfg.output_format);
        let source_duration_secs = entries.last().map(|e| e.end);

        info!(
            entries = entries.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "transcription finished"
        );
        Ok(TaskResult::Transcription(TranscriptionResult {
            entries,
            content,
            format: cfg.output_format,
            metadata: TaskMetadata {
                language: Some(cfg.language),
                model: self.model.clone(),
                processing_time_secs: Some(started.elapsed().as_secs_f64()),
                source_duration_secs,
            },
        }))
    }
}

async fn cleanup(downloaded: bool, path: &Path) {
    if downloaded {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove downloaded audio");
        }
    }
}

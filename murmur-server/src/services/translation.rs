//! Subtitle translation executor.
//!
//! Parses the submitted LRC document and translates it line by line
//! through a pluggable [`Translator`] backend. A single failed line does
//! not fail the task; the original text is kept and the failure counted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use murmur_core::subtitle::{self, SubtitleEntry};
use murmur_core::{
    CancelToken, ExecutionError, Executor, InputRef, LanguageCode, ProgressHandle, TaskConfig,
    TaskMetadata, TaskResult, TranslationEntry, TranslationResult,
};
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;

/// One text-to-text translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;
    async fn translate(
        &self,
        text: &str,
        target: LanguageCode,
    ) -> Result<String, ExecutionError>;
}

/// Talks to any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiTranslator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(endpoint: String, api_key: Option<String>, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn translate(
        &self,
        text: &str,
        target: LanguageCode,
    ) -> Result<String, ExecutionError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "Translate the following Japanese subtitle line into {target}. \
                         Reply with the translation only, no commentary."
                    ),
                },
                { "role": "user", "content": text },
            ],
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::translation(format!("translator request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ExecutionError::translation(format!(
                "translator returned HTTP {}",
                response.status()
            )));
        }
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::translation(format!("invalid translator response: {e}")))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExecutionError::translation("translator response had no content"))
    }
}

/// Echoes the input unchanged. The default backend when no translator
/// endpoint is configured; also useful for wiring tests.
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn translate(
        &self,
        text: &str,
        _target: LanguageCode,
    ) -> Result<String, ExecutionError> {
        Ok(text.to_owned())
    }
}

pub struct TranslationExecutor {
    translators: HashMap<String, Arc<dyn Translator>>,
    default_name: String,
}

impl TranslationExecutor {
    pub fn new(config: &Config) -> Self {
        let mut translators: HashMap<String, Arc<dyn Translator>> = HashMap::new();
        translators.insert("passthrough".to_owned(), Arc::new(PassthroughTranslator));

        let default_name = if let Some(endpoint) = &config.translator_endpoint {
            let openai = OpenAiTranslator::new(
                endpoint.clone(),
                config.translator_api_key.clone(),
                config.translator_model.clone(),
            );
            translators.insert(openai.name().to_owned(), Arc::new(openai));
            "openai".to_owned()
        } else {
            "passthrough".to_owned()
        };

        Self {
            translators,
            default_name,
        }
    }

    /// Test/bench constructor with an explicit backend set.
    pub fn with_translators(
        translators: Vec<Arc<dyn Translator>>,
        default_name: impl Into<String>,
    ) -> Self {
        Self {
            translators: translators
                .into_iter()
                .map(|t| (t.name().to_owned(), t))
                .collect(),
            default_name: default_name.into(),
        }
    }
}

#[async_trait]
impl Executor for TranslationExecutor {
    async fn run(
        &self,
        input: InputRef,
        config: TaskConfig,
        progress: ProgressHandle,
        cancel: CancelToken,
    ) -> Result<TaskResult, ExecutionError> {
        let TaskConfig::Translation(cfg) = config else {
            return Err(ExecutionError::input("expected a translation config"));
        };
        let InputRef::Inline(content) = input else {
            return Err(ExecutionError::input(
                "translation input must be inline LRC content",
            ));
        };
        let name = cfg.translator.as_deref().unwrap_or(&self.default_name);
        let translator = self
            .translators
            .get(name)
            .ok_or_else(|| ExecutionError::translation(format!("unknown translator '{name}'")))?;

        let source: Vec<SubtitleEntry> = subtitle::parse_lrc(&content);
        let total = source.len();
        let started = Instant::now();

        let mut entries = Vec::with_capacity(total);
        let mut failed = 0usize;
        for (index, entry) in source.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecutionError::translation(
                    "translation aborted by cancellation",
                ));
            }
            progress
                .report(
                    index as f64 / total as f64,
                    format!("Translating line {}/{total}", index + 1),
                )
                .await;

            let translated_text = match translator
                .translate(&entry.text, cfg.target_language)
                .await
            {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "line translation failed");
                    failed += 1;
                    None
                }
            };
            entries.push(TranslationEntry {
                start: entry.start,
                end: entry.end,
                original_text: entry.text,
                translated_text,
            });
        }

        let translated = total - failed;
        if translated == 0 {
            return Err(ExecutionError::translation(
                "every line failed to translate",
            ));
        }

        // Render back to LRC, falling back to the original text for
        // lines the translator could not handle.
        let rendered: Vec<SubtitleEntry> = entries
            .iter()
            .map(|e| SubtitleEntry {
                start: e.start,
                end: e.end,
                text: e
                    .translated_text
                    .clone()
                    .unwrap_or_else(|| e.original_text.clone()),
            })
            .collect();
        let content = subtitle::render_lrc(&rendered);

        info!(
            translator = translator.name(),
            total, translated, failed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "translation finished"
        );
        Ok(TaskResult::Translation(TranslationResult {
            entries,
            content,
            total_entries: total,
            translated_entries: translated,
            failed_entries: failed,
            metadata: TaskMetadata {
                language: Some(cfg.target_language.to_string()),
                model: Some(translator.name().to_owned()),
                processing_time_secs: Some(started.elapsed().as_secs_f64()),
                source_duration_secs: None,
            },
        }))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use murmur_core::{
        ExecutorSet, ManagerSettings, TaskManager, TaskStatus, TaskType, TranslationConfig,
    };

    use super::*;

    /// Fails every line containing the word "bad".
    struct FlakyTranslator;

    #[async_trait]
    impl Translator for FlakyTranslator {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn translate(
            &self,
            text: &str,
            _target: LanguageCode,
        ) -> Result<String, ExecutionError> {
            if text.contains("bad") {
                Err(ExecutionError::translation("nope"))
            } else {
                Ok(format!("<{text}>"))
            }
        }
    }

    fn manager_with(executor: TranslationExecutor) -> Arc<TaskManager> {
        let executors = ExecutorSet::new().register(TaskType::Translation, Arc::new(executor));
        TaskManager::start(
            ManagerSettings {
                max_concurrent_tasks: 1,
                retention: None,
            },
            executors,
        )
    }

    async fn wait_terminal(manager: &TaskManager, id: murmur_core::TaskId) -> TaskStatus {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = manager.get_status(id).await.expect("task exists");
                if snapshot.status.is_terminal() {
                    break snapshot.status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("task should finish")
    }

    fn translation_config() -> TaskConfig {
        TaskConfig::Translation(TranslationConfig {
            target_language: LanguageCode::English,
            translator: None,
        })
    }

    #[tokio::test]
    async fn translates_every_line_and_renders_lrc() {
        let executor =
            TranslationExecutor::with_translators(vec![Arc::new(FlakyTranslator)], "flaky");
        let manager = manager_with(executor);

        let lrc = "[00:01.00]hello\n[00:03.50]world\n";
        let task = manager
            .submit(translation_config(), InputRef::Inline(lrc.to_owned()))
            .await
            .expect("submit");
        assert_eq!(wait_terminal(&manager, task.id).await, TaskStatus::Completed);

        let TaskResult::Translation(result) = manager.get_result(task.id).await.unwrap() else {
            panic!("expected a translation result");
        };
        assert_eq!(result.total_entries, 2);
        assert_eq!(result.translated_entries, 2);
        assert_eq!(result.failed_entries, 0);
        assert!(result.content.contains("<hello>"));
        assert!(result.content.contains("<world>"));
    }

    #[tokio::test]
    async fn failed_lines_keep_original_text() {
        let executor =
            TranslationExecutor::with_translators(vec![Arc::new(FlakyTranslator)], "flaky");
        let manager = manager_with(executor);

        let lrc = "[00:01.00]good line\n[00:03.00]bad line\n";
        let task = manager
            .submit(translation_config(), InputRef::Inline(lrc.to_owned()))
            .await
            .expect("submit");
        assert_eq!(wait_terminal(&manager, task.id).await, TaskStatus::Completed);

        let TaskResult::Translation(result) = manager.get_result(task.id).await.unwrap() else {
            panic!("expected a translation result");
        };
        assert_eq!(result.translated_entries, 1);
        assert_eq!(result.failed_entries, 1);
        assert!(result.entries[1].translated_text.is_none());
        // Fallback rendering keeps the untranslated original.
        assert!(result.content.contains("bad line"));
    }

    #[tokio::test]
    async fn all_lines_failing_fails_the_task() {
        let executor =
            TranslationExecutor::with_translators(vec![Arc::new(FlakyTranslator)], "flaky");
        let manager = manager_with(executor);

        let task = manager
            .submit(
                translation_config(),
                InputRef::Inline("[00:01.00]bad\n".to_owned()),
            )
            .await
            .expect("submit");
        assert_eq!(wait_terminal(&manager, task.id).await, TaskStatus::Failed);
        let snapshot = manager.get_status(task.id).await.unwrap();
        assert!(snapshot.error.is_some());
    }

    #[tokio::test]
    async fn unknown_translator_fails_the_task() {
        let executor =
            TranslationExecutor::with_translators(vec![Arc::new(PassthroughTranslator)], "passthrough");
        let manager = manager_with(executor);

        let config = TaskConfig::Translation(TranslationConfig {
            target_language: LanguageCode::English,
            translator: Some("missing".to_owned()),
        });
        let task = manager
            .submit(config, InputRef::Inline("[00:01.00]line\n".to_owned()))
            .await
            .expect("submit");
        assert_eq!(wait_terminal(&manager, task.id).await, TaskStatus::Failed);
    }
}

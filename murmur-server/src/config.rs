//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration for murmur-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Maximum number of tasks executing concurrently.
    pub max_concurrent_tasks: usize,

    /// Requests admitted per client per rate-limit window.
    pub rate_limit_requests: u32,

    /// Rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Seconds a terminal task stays queryable. `0` disables eviction.
    pub task_retention_secs: u64,

    /// Seconds between retention sweeps.
    pub sweep_interval_secs: u64,

    /// Comma-separated CORS origin allowlist. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui` (default: `true`).
    pub enable_swagger: bool,

    /// Speech-to-text command. Invoked as
    /// `<command> -l <language> -f <audio path>` and must print LRC
    /// lines to stdout.
    pub whisper_command: String,

    /// Model identifier recorded in transcription result metadata.
    pub whisper_model: Option<String>,

    /// Directory for downloaded remote audio files.
    pub work_dir: PathBuf,

    /// Base URL of an OpenAI-compatible chat-completions API. `None`
    /// falls back to the passthrough translator.
    pub translator_endpoint: Option<String>,

    /// Bearer token for the translator endpoint.
    pub translator_api_key: Option<String>,

    /// Chat model requested from the translator endpoint.
    pub translator_model: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("MURMUR_BIND", "0.0.0.0:8000"),
            log_level: env_or("MURMUR_LOG", "info"),
            log_json: std::env::var("MURMUR_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_concurrent_tasks: parse_env("MURMUR_MAX_CONCURRENT_TASKS", 5),
            rate_limit_requests: parse_env("MURMUR_RATE_LIMIT_REQUESTS", 100),
            rate_limit_window_secs: parse_env("MURMUR_RATE_LIMIT_WINDOW", 3600),
            task_retention_secs: parse_env("MURMUR_TASK_RETENTION", 24 * 60 * 60),
            sweep_interval_secs: parse_env("MURMUR_SWEEP_INTERVAL", 300),
            cors_allowed_origins: std::env::var("MURMUR_CORS_ORIGINS").ok(),
            enable_swagger: std::env::var("MURMUR_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            whisper_command: env_or("MURMUR_WHISPER_COMMAND", "whisper-cli"),
            whisper_model: std::env::var("MURMUR_WHISPER_MODEL").ok(),
            work_dir: std::env::var("MURMUR_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            translator_endpoint: std::env::var("MURMUR_TRANSLATOR_ENDPOINT").ok(),
            translator_api_key: std::env::var("MURMUR_TRANSLATOR_API_KEY").ok(),
            translator_model: env_or("MURMUR_TRANSLATOR_MODEL", "gpt-4o-mini"),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

//! murmur-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the transcription/translation executors.
//! 4. Start the task manager (dispatch loop + retention sweep).
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use murmur_core::{
    ExecutorSet, ManagerSettings, RateLimiter, RetentionPolicy, TaskManager, TaskType,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::services::transcription::TranscriptionExecutor;
use crate::services::translation::TranslationExecutor;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: MURMUR_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "murmur-server starting");

    // ── 3. Executors ───────────────────────────────────────────────────────────
    let executors = ExecutorSet::new()
        .register(
            TaskType::Transcription,
            Arc::new(TranscriptionExecutor::new(&cfg)),
        )
        .register(
            TaskType::Translation,
            Arc::new(TranslationExecutor::new(&cfg)),
        );

    // ── 4. Task manager ────────────────────────────────────────────────────────
    let retention = if cfg.task_retention_secs == 0 {
        warn!("task retention disabled; terminal tasks are kept until shutdown");
        None
    } else {
        Some(RetentionPolicy {
            ttl: Duration::from_secs(cfg.task_retention_secs),
            sweep_interval: Duration::from_secs(cfg.sweep_interval_secs.max(1)),
        })
    };
    let manager = TaskManager::start(
        ManagerSettings {
            max_concurrent_tasks: cfg.max_concurrent_tasks.max(1),
            retention,
        },
        executors,
    );

    // ── 5. Shared application state ────────────────────────────────────────────
    let limiter = Arc::new(RateLimiter::new(
        cfg.rate_limit_requests,
        Duration::from_secs(cfg.rate_limit_window_secs.max(1)),
    ));
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        manager,
        limiter,
    });

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("murmur-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

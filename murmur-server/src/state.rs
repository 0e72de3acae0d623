//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use murmur_core::{RateLimiter, TaskManager};

use crate::config::Config;

/// State shared across all HTTP handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// The orchestration facade: submission, polling, cancellation.
    pub manager: Arc<TaskManager>,
    /// Fixed-window request limiter applied to the `/api` surface.
    pub limiter: Arc<RateLimiter>,
}

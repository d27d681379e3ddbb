//! HTTP API for the agent
//!
//! Chat, timezone configuration, session context and health endpoints.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::rate_limit::RateLimiter;
use crate::runtime::ProductionRuntime;
use crate::settings::SessionSettings;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<SessionSettings>,
}

impl AppState {
    pub fn new(
        runtime: Arc<ProductionRuntime>,
        rate_limiter: Arc<RateLimiter>,
        settings: Arc<SessionSettings>,
    ) -> Self {
        Self {
            runtime,
            rate_limiter,
            settings,
        }
    }
}

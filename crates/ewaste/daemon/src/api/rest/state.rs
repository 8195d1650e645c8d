//! Application state for API handlers

use ewaste_workflow::{IdentityResolver, WorkflowCoordinator};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<WorkflowCoordinator>,

    /// Turns request credentials into principals
    pub identity: Arc<dyn IdentityResolver>,

    pub version: String,

    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(coordinator: Arc<WorkflowCoordinator>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            coordinator,
            identity,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();
        match secs {
            s if s < 60 => format!("{s}s"),
            s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
            s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        }
    }
}

//! Shared application state for the Axum API server.

use beacon_common::config::AppConfig;
use beacon_notifier::NotificationQueue;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub queue: NotificationQueue,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(queue: NotificationQueue, config: AppConfig) -> Self {
        Self { queue, config }
    }
}

/// Shared application state
use eve_ts3_sync::SyncEngine;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

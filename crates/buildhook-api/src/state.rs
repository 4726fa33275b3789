//! Application state.

use buildhook_config::ServerSettings;
use buildhook_scheduler::{JobDispatcher, JobRunner};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServerSettings>,
    pub dispatcher: Arc<JobDispatcher>,
}

impl AppState {
    pub fn new(settings: ServerSettings, runner: Arc<JobRunner>) -> Self {
        let dispatcher = Arc::new(JobDispatcher::new(runner, settings.runner.clone()));
        Self {
            settings: Arc::new(settings),
            dispatcher,
        }
    }
}

use crate::config::Config;
use crate::dashboard::PollerHandle;
use crate::db::Repository;
use chrono::FixedOffset;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub config: Arc<Config>,
    pub dashboard: PollerHandle,
}

impl AppState {
    pub fn new(repository: Arc<Repository>, config: Config, dashboard: PollerHandle) -> Self {
        Self {
            repository,
            config: Arc::new(config),
            dashboard,
        }
    }

    /// Offset for "today", day keys and the history window.
    pub fn offset(&self) -> FixedOffset {
        self.dashboard.offset()
    }
}

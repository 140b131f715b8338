use std::sync::Arc;

use crate::api::config::ApiConfig;
use crate::scheduler::TaskClient;

/// 所有 handler 共享的状态
#[derive(Clone)]
pub struct AppState {
    pub client: TaskClient,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(client: TaskClient, config: ApiConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

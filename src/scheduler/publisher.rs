use std::sync::Arc;
use std::time::Duration;

use crate::common::error::Result;
use crate::common::{TaskData, TaskOutcome, TaskResult};
use crate::persistence::ResultStore;

/// 结果发布器
///
/// 把 Worker 的产出序列化成 `TaskResult`，以 `前缀 + 任务 ID` 为 Key、
/// 固定 TTL 写入结果存储。同一个任务只会被一个 Worker 执行，因此每个 Key 至多写一次。
#[derive(Clone)]
pub struct ResultPublisher {
    store: Arc<dyn ResultStore>,
    ttl: Duration,
}

impl ResultPublisher {
    pub fn new(store: Arc<dyn ResultStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn publish(&self, task: &TaskData, outcome: TaskOutcome) -> Result<()> {
        let record = TaskResult::new(task.id.clone(), outcome);
        let payload = serde_json::to_vec(&record)?;
        self.store
            .put_with_ttl(&task.result_key(), &payload, self.ttl)
            .await
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

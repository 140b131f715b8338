use std::sync::Arc;

use crate::{
    common::{
        DispatchError, JobKind, QueueNames, Result, TaskData, TaskResult, new_task_id,
    },
    persistence::{ResultStore, TaskQueue},
};

/// 轮询结果
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// 还没有结果
    ///
    /// 注意: ID 不存在、尚未处理完、失败未发布、结果已过期，都是这个状态。
    Pending,
    /// 结果已发布
    Ready(TaskResult),
}

/// 提交 / 轮询客户端
///
/// HTTP 层通过它和调度引擎打交道，本身不持有任何 Worker。
#[derive(Clone)]
pub struct TaskClient {
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn ResultStore>,
    queues: QueueNames,
}

impl TaskClient {
    pub fn new(queue: Arc<dyn TaskQueue>, store: Arc<dyn ResultStore>, queues: QueueNames) -> Self {
        Self {
            queue,
            store,
            queues,
        }
    }

    /// 提交任务到对应的入站队列
    pub async fn submit(&self, task: &TaskData) -> Result<()> {
        if task.id.trim().is_empty() {
            return Err(DispatchError::InvalidTask("task id cannot be empty".into()));
        }
        if task.kind == JobKind::Unknown {
            return Err(DispatchError::InvalidTask(format!(
                "task {} has no supported type",
                task.id
            )));
        }

        let payload = serde_json::to_vec(task)?;
        self.queue
            .push(self.queues.inbound_for(task.kind), &payload)
            .await
    }

    /// 创建并提交一个任务，返回任务 ID
    pub async fn submit_new(&self, kind: JobKind, filename: &str) -> Result<String> {
        let task = TaskData::with_id(new_task_id(), kind, filename);
        self.submit(&task).await?;
        Ok(task.id)
    }

    /// 按 ID 轮询结果
    ///
    /// - 先 `exists`，不存在即 `Pending`。
    /// - 存在再 `get` 并解码。Key 恰好在两次调用之间过期时返回 `ResultMissing`，
    ///   解码失败返回 `Serialization`，调用方都应当作暂时性的服务端错误处理。
    pub async fn poll(&self, kind: JobKind, task_id: &str) -> Result<PollStatus> {
        let key = kind.result_key(task_id);
        if !self.store.exists(&key).await? {
            return Ok(PollStatus::Pending);
        }

        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| DispatchError::ResultMissing(key.clone()))?;
        let result: TaskResult = serde_json::from_slice(&raw)?;
        Ok(PollStatus::Ready(result))
    }
}

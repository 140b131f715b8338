use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    common::{TaskData, config::DispatchConfig},
    driver::DriverMetrics,
    persistence::TaskQueue,
};

/// 驱动器上下文 (Driver Context)
///
/// **职责**:
/// 每个节点只有一个 Ingest，它打包了 Ingest 运行所需的全局资源，
/// 避免在函数调用时传递一长串参数。
#[derive(Clone)]
pub struct DriverContext {
    /// 当前节点标识 (主机名)，只用于日志
    pub node_id: String,

    /// 任务队列层 (负责 Pop)
    pub queue: Arc<dyn TaskQueue>,

    /// 全局配置
    pub config: Arc<DispatchConfig>,

    /// 全局统计指标
    pub metrics: Arc<DriverMetrics>,

    /// 关机信号
    pub shutdown: CancellationToken,
}

impl DriverContext {
    /// 创建一个新的驱动器上下文
    pub fn new(
        node_id: String,
        queue: Arc<dyn TaskQueue>,
        config: Arc<DispatchConfig>,
        metrics: Arc<DriverMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            node_id,
            queue,
            config,
            metrics,
            shutdown,
        }
    }

    /// 检查是否收到停机信号
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 把已出队但来不及执行的任务放回入站队列尾部
    ///
    /// 只在停机时使用。放回失败就只能记日志，任务丢失 (至多一次)。
    pub async fn requeue(&self, task: &TaskData) {
        let queue = self.config.queues.inbound_for(task.kind);
        let payload = match serde_json::to_vec(task) {
            Ok(p) => p,
            Err(e) => {
                error!(task_id = %task.id, "[Requeue] Serialize failed, task lost: {}", e);
                return;
            }
        };
        match self.queue.push(queue, &payload).await {
            Ok(()) => warn!(task_id = %task.id, queue = %queue, "[Requeue] Task returned to inbound queue"),
            Err(e) => error!(task_id = %task.id, queue = %queue, "[Requeue] Push failed, task lost: {}", e),
        }
    }
}

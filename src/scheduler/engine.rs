use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    driver::{DriverMetrics, MetricsSnapshot},
    scheduler::{builder::EngineBuilder, client::TaskClient},
};

/// 运行中的调度引擎
///
/// 持有 Ingest、所有 Dispatcher 和 Worker 的后台任务。
/// 通过 `EngineBuilder::start` 得到。
pub struct Engine {
    node_id: String,
    shutdown: CancellationToken,
    metrics: Arc<DriverMetrics>,
    client: TaskClient,
    tasks: JoinSet<()>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn new(
        node_id: String,
        shutdown: CancellationToken,
        metrics: Arc<DriverMetrics>,
        client: TaskClient,
        tasks: JoinSet<()>,
    ) -> Self {
        Self {
            node_id,
            shutdown,
            metrics,
            client,
            tasks,
        }
    }

    /// 与引擎共用同一套队列和存储的客户端
    pub fn client(&self) -> TaskClient {
        self.client.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 发出停机信号 (不等待)
    pub fn shutdown(&self) {
        info!("[Engine-{}] Shutdown requested.", self.node_id);
        self.shutdown.cancel();
    }

    /// 等待所有后台任务退出
    ///
    /// 正在执行的任务会先做完并发布结果。
    pub async fn join(mut self) -> MetricsSnapshot {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                error!("[Engine-{}] Background task failed: {}", self.node_id, e);
            }
        }
        let snapshot = self.metrics.snapshot();
        info!(metrics = ?snapshot, "[Engine-{}] Stopped.", self.node_id);
        snapshot
    }

    /// 停机并等待完成
    pub async fn shutdown_and_wait(self) -> MetricsSnapshot {
        self.shutdown();
        self.join().await
    }
}

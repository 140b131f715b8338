use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::common::{JobKind, TaskData};
use crate::driver::context::DriverContext;
use crate::driver::pacemaker::{PacemakerEvent, TaskPacemaker};
use crate::persistence::PopStatus;
use crate::policy::WaitStrategy;

/// 路由结果
enum RouteOutcome {
    /// 已送入对应的池
    Routed,
    /// 没有对应的池，任务被丢弃
    Dropped,
    /// 停机或下游已关闭，任务已放回队列，Ingest 应该退出
    Stop,
}

/// 入站驱动器 (Ingest Loop)
///
/// 单个顺序读取者：
/// 1. 依次对每个入站队列做一次非阻塞出队。
/// 2. 解码，损坏的条目丢弃 (毒丸)。
/// 3. 按任务类型送入对应池的有界 channel；channel 满时阻塞，形成背压。
///    阻塞期间收到停机信号，手上的任务放回入站队列。
/// 4. 一整轮都没拿到东西时，交给起搏器决定睡多久。
///
/// 退出时丢弃所有 Sender，下游 Dispatcher 取完剩余任务后自然结束。
pub struct IngestDriver {
    ctx: DriverContext,
    /// 任务类型 -> 对应池的任务 channel
    routes: HashMap<JobKind, mpsc::Sender<TaskData>>,
    wait_strategy: Arc<dyn WaitStrategy>,
}

impl IngestDriver {
    pub fn new(
        ctx: DriverContext,
        routes: HashMap<JobKind, mpsc::Sender<TaskData>>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Self {
        Self {
            ctx,
            routes,
            wait_strategy,
        }
    }

    /// 主循环，直到收到停机信号
    pub async fn run(self) {
        let queues = self.ctx.config.queues.all();
        let mut pacemaker = TaskPacemaker::new(&self.ctx.shutdown, self.wait_strategy.clone());

        trace!(
            "[Ingest-{}] Started. Polling queues {:?}",
            self.ctx.node_id, queues
        );

        'outer: loop {
            match pacemaker.wait_next().await {
                PacemakerEvent::Trigger => {}
                PacemakerEvent::Shutdown => break,
            }

            let mut found = false;
            for queue in &queues {
                if self.ctx.is_shutdown() {
                    break 'outer;
                }

                let raw = match self.ctx.queue.pop(queue).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        // 存储不可用: 本轮当作空闲，交给起搏器退避
                        if e.is_retryable() {
                            warn!("[Ingest] Pop from '{}' failed, will retry: {}", queue, e);
                        } else {
                            error!("[Ingest] Pop from '{}' failed: {}", queue, e);
                        }
                        continue;
                    }
                };

                match PopStatus::decode(raw) {
                    PopStatus::Empty => {}
                    PopStatus::Corrupted {
                        reason,
                        raw_content,
                    } => {
                        found = true;
                        self.ctx.metrics.inc_ingested();
                        self.ctx.metrics.inc_corrupt();
                        error!(
                            queue = %queue,
                            raw = %raw_content,
                            "[Ingest] Dropping malformed entry: {}", reason
                        );
                    }
                    PopStatus::Task(task) => {
                        found = true;
                        self.ctx.metrics.inc_ingested();
                        match self.route(task).await {
                            RouteOutcome::Routed | RouteOutcome::Dropped => {}
                            RouteOutcome::Stop => break 'outer,
                        }
                    }
                }
            }

            if found {
                pacemaker.mark_busy();
            } else {
                pacemaker.mark_idle();
                trace!(idle = pacemaker.idle_count(), "[Ingest] All inbound queues empty");
            }
        }

        trace!("[Ingest-{}] Stopped.", self.ctx.node_id);
    }

    /// 把任务送入对应池的 channel
    ///
    /// channel 满时在这里阻塞，直到有空位或者收到停机信号。
    /// 用 `reserve` 先占位再发送，停机时任务还在手上，可以放回队列。
    async fn route(&self, task: TaskData) -> RouteOutcome {
        let Some(tx) = self.routes.get(&task.kind) else {
            self.ctx.metrics.inc_unroutable();
            warn!(
                task_id = %task.id,
                kind = %task.kind,
                "[Ingest] No worker pool for task type, dropping"
            );
            return RouteOutcome::Dropped;
        };

        tokio::select! {
            // 有空位时优先送达，停机瞬间能投递的照样投递
            biased;
            permit = tx.reserve() => match permit {
                Ok(permit) => {
                    debug!(task_id = %task.id, kind = %task.kind, "[Ingest] Routed");
                    permit.send(task);
                    self.ctx.metrics.inc_routed();
                    RouteOutcome::Routed
                }
                Err(_) => {
                    error!(task_id = %task.id, kind = %task.kind, "[Ingest] Dispatcher channel closed");
                    self.ctx.requeue(&task).await;
                    RouteOutcome::Stop
                }
            },
            _ = self.ctx.shutdown.cancelled() => {
                self.ctx.requeue(&task).await;
                RouteOutcome::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::common::DispatchConfig;
    use crate::driver::DriverMetrics;
    use crate::persistence::{MemoryPersistence, TaskQueue};
    use crate::policy::FixedWait;

    fn driver(
        mem: &MemoryPersistence,
        routes: HashMap<JobKind, mpsc::Sender<TaskData>>,
        shutdown: CancellationToken,
    ) -> (IngestDriver, Arc<DriverMetrics>) {
        let metrics = Arc::new(DriverMetrics::default());
        let ctx = DriverContext::new(
            "test".into(),
            Arc::new(mem.clone()),
            Arc::new(DispatchConfig::default()),
            metrics.clone(),
            shutdown,
        );
        (
            IngestDriver::new(ctx, routes, Arc::new(FixedWait::new(10))),
            metrics,
        )
    }

    #[tokio::test]
    async fn routes_by_kind_and_drops_garbage() {
        let mem = MemoryPersistence::new();
        let nsfw = TaskData::new(JobKind::NsfwClassification, "/tmp/a");
        let grab = TaskData::new(JobKind::Segmentation, "/tmp/b");
        let odd = r#"{"uuid":"x","type":"ocr","filename":"/tmp/c"}"#;

        mem.push("predictme", b"garbage").await.unwrap();
        mem.push("predictme", odd.as_bytes()).await.unwrap();
        mem.push("predictme", &serde_json::to_vec(&nsfw).unwrap())
            .await
            .unwrap();
        mem.push("grabcutme", &serde_json::to_vec(&grab).unwrap())
            .await
            .unwrap();

        let (nsfw_tx, mut nsfw_rx) = mpsc::channel(4);
        let (grab_tx, mut grab_rx) = mpsc::channel(4);
        let routes = HashMap::from([
            (JobKind::NsfwClassification, nsfw_tx),
            (JobKind::Segmentation, grab_tx),
        ]);

        let token = CancellationToken::new();
        let (ingest, metrics) = driver(&mem, routes, token.clone());
        let handle = tokio::spawn(ingest.run());

        let got = tokio::time::timeout(Duration::from_secs(2), nsfw_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, nsfw);
        let got = tokio::time::timeout(Duration::from_secs(2), grab_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, grab);

        token.cancel();
        handle.await.unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_ingested, 4);
        assert_eq!(snap.dropped_corrupt, 1);
        assert_eq!(snap.dropped_unroutable, 1);
        assert_eq!(snap.total_routed, 2);
        assert_eq!(mem.pending_in("predictme"), 0);

        // Sender 随 Ingest 一起被丢弃
        assert!(nsfw_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_channel_blocks_until_shutdown() {
        let mem = MemoryPersistence::new();
        for _ in 0..3 {
            let task = TaskData::new(JobKind::Classification, "/tmp/x");
            mem.push("predictme", &serde_json::to_vec(&task).unwrap())
                .await
                .unwrap();
        }

        let (tx, _rx) = mpsc::channel(1);
        let routes = HashMap::from([(JobKind::Classification, tx)]);
        let token = CancellationToken::new();
        let (ingest, metrics) = driver(&mem, routes, token.clone());
        let handle = tokio::spawn(ingest.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        // 第一个进了 channel，第二个卡在等待空位上，第三个还留在队列里
        assert_eq!(metrics.snapshot().total_routed, 1);
        assert_eq!(mem.pending_in("predictme"), 1);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        // 卡住的那个被放回了队尾
        assert_eq!(mem.pending_in("predictme"), 2);
    }
}

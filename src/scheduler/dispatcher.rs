use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::common::error::{DispatchError, Result};
use crate::common::{Capability, CapabilityLoader, JobKind, TaskData};
use crate::scheduler::context::PoolContext;
use crate::scheduler::registry::{WorkerSlot, idle_registry};
use crate::scheduler::worker::PoolWorker;

/// 单类型调度器
///
/// 管理一个固定大小的 Worker 池，把该类型的任务逐个配对给空闲 Worker：
/// 先按 FIFO 取一个任务，再取一个空闲令牌，最后通过令牌把任务交出去。
/// 交不出去 (令牌过期) 的任务会换下一个令牌重试，不会丢在已停止的 Worker 手里。
pub struct Dispatcher {
    ctx: PoolContext,
    capabilities: Vec<Box<dyn Capability>>,
    task_rx: mpsc::Receiver<TaskData>,
}

impl Dispatcher {
    /// 加载池内全部能力实例
    ///
    /// 每个 Worker 一份，按顺序在阻塞线程上加载。任何一份失败都返回 `ModelLoad`，
    /// 已加载的实例随之释放。
    pub async fn load(
        ctx: PoolContext,
        pool_size: usize,
        model_dir: PathBuf,
        loader: Arc<dyn CapabilityLoader>,
        task_rx: mpsc::Receiver<TaskData>,
    ) -> Result<Self> {
        let kind = ctx.kind;
        let mut capabilities = Vec::with_capacity(pool_size);

        for worker in 0..pool_size {
            let loader = loader.clone();
            let dir = model_dir.clone();
            let loaded = tokio::task::spawn_blocking(move || loader.load(&dir)).await?;
            let capability = loaded.map_err(|e| DispatchError::ModelLoad {
                kind,
                worker,
                reason: format!("{:#}", e),
            })?;
            capabilities.push(capability);
        }

        info!(
            model_dir = %model_dir.display(),
            "[Dispatcher-{}] Loaded {} worker(s).", kind, pool_size
        );

        Ok(Self {
            ctx,
            capabilities,
            task_rx,
        })
    }

    pub fn kind(&self) -> JobKind {
        self.ctx.kind
    }

    /// 启动 Worker 和配对循环
    pub fn spawn(self, tasks: &mut JoinSet<()>) {
        let Self {
            ctx,
            capabilities,
            task_rx,
        } = self;

        let (ready_tx, ready_rx) = idle_registry(capabilities.len());
        for (id, capability) in capabilities.into_iter().enumerate() {
            let worker = PoolWorker::new(id, ctx.clone(), capability, ready_tx.clone());
            tasks.spawn(worker.run());
        }
        // 只保留 Worker 手里的 Sender: 全部 Worker 退出后配对循环能感知到
        drop(ready_tx);

        tasks.spawn(match_loop(ctx, task_rx, ready_rx));
    }
}

/// 配对循环
///
/// 停机后不再取新任务；channel 里剩下的任务放回入站队列。
async fn match_loop(
    ctx: PoolContext,
    mut task_rx: mpsc::Receiver<TaskData>,
    mut ready_rx: mpsc::Receiver<WorkerSlot>,
) {
    let kind = ctx.kind;
    trace!("[Dispatcher-{}] Matching started.", kind);

    'outer: loop {
        let mut task = tokio::select! {
            biased;
            _ = ctx.base.shutdown.cancelled() => break,
            next = task_rx.recv() => match next {
                Some(task) => task,
                None => break,
            },
        };

        loop {
            let slot = tokio::select! {
                biased;
                slot = ready_rx.recv() => slot,
                _ = ctx.base.shutdown.cancelled() => None,
            };
            let Some(slot) = slot else {
                // 没有 Worker 可用了 (停机或全部退出)
                ctx.base.requeue(&task).await;
                break 'outer;
            };

            let worker_id = slot.worker_id;
            match slot.hand_off(task) {
                Ok(()) => {
                    debug!("[Dispatcher-{}] Task handed to worker {}", kind, worker_id);
                    break;
                }
                Err(returned) => {
                    debug!("[Dispatcher-{}] Worker {} slot is stale, retrying", kind, worker_id);
                    task = returned;
                }
            }
        }
    }

    // 停止接收，把缓冲区里剩下的任务还回去
    task_rx.close();
    let mut returned = 0usize;
    while let Some(task) = task_rx.recv().await {
        ctx.base.requeue(&task).await;
        returned += 1;
    }
    if returned > 0 {
        warn!("[Dispatcher-{}] Returned {} buffered task(s) to the inbound queue.", kind, returned);
    }

    trace!("[Dispatcher-{}] Matching stopped.", kind);
}

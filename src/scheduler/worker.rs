use std::any::Any;
use std::panic::AssertUnwindSafe;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::common::{Capability, TaskData, TaskOutcome};
use crate::scheduler::context::PoolContext;
use crate::scheduler::registry::WorkerSlot;

/// 池内的常驻 Worker
///
/// 独占一份已加载的能力实例，一次只做一个任务：
/// 1. 登记一个空闲令牌，等待任务或停机信号。
/// 2. 在阻塞线程上执行能力 (实例随任务一起移过去，做完再拿回来，不需要锁)。
/// 3. 发布结果；分类任务再回收上传的临时文件。
/// 4. 回到第 1 步。
///
/// 正在执行的任务不会被停机打断，停机只在两次任务之间生效。
pub struct PoolWorker {
    id: usize,
    ctx: PoolContext,
    /// 执行期间暂时移交给阻塞线程
    capability: Option<Box<dyn Capability>>,
    ready_tx: mpsc::Sender<WorkerSlot>,
}

impl PoolWorker {
    pub fn new(
        id: usize,
        ctx: PoolContext,
        capability: Box<dyn Capability>,
        ready_tx: mpsc::Sender<WorkerSlot>,
    ) -> Self {
        Self {
            id,
            ctx,
            capability: Some(capability),
            ready_tx,
        }
    }

    pub async fn run(mut self) {
        let kind = self.ctx.kind;
        trace!("[Worker-{}-{}] Started.", kind, self.id);

        loop {
            if self.ctx.is_shutdown() {
                break;
            }

            let (slot, mut rx) = WorkerSlot::new(self.id);
            if self.ready_tx.send(slot).await.is_err() {
                // Dispatcher 已退出
                break;
            }

            let task = tokio::select! {
                biased;
                res = &mut rx => match res {
                    Ok(task) => task,
                    Err(_) => break,
                },
                _ = self.ctx.base.shutdown.cancelled() => {
                    // 关闭令牌后再看一眼: 停机前一刻刚交过来的任务照样执行
                    rx.close();
                    match rx.try_recv() {
                        Ok(task) => task,
                        Err(_) => break,
                    }
                }
            };

            if !self.process(task).await {
                break;
            }
        }

        trace!("[Worker-{}-{}] Stopped.", kind, self.id);
    }

    /// 执行一个任务，返回 Worker 是否还能继续工作
    async fn process(&mut self, task: TaskData) -> bool {
        let Some(mut capability) = self.capability.take() else {
            return false;
        };

        let metrics = &self.ctx.base.metrics;
        let task_id = task.id.clone();
        debug!(task_id = %task_id, "[Worker-{}-{}] Executing", self.ctx.kind, self.id);

        metrics.inc_active();
        let joined = tokio::task::spawn_blocking(move || {
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| capability.execute(&task)));
            (capability, task, outcome)
        })
        .await;
        metrics.dec_active();

        let (capability, task, outcome) = match joined {
            Ok(parts) => parts,
            Err(e) => {
                // 实例随阻塞线程一起丢了，这个 Worker 无法继续
                error!(task_id = %task_id, "[Worker-{}-{}] Blocking thread lost: {}", self.ctx.kind, self.id, e);
                metrics.inc_failure();
                return false;
            }
        };
        self.capability = Some(capability);

        let outcome = match outcome {
            Ok(Ok(TaskOutcome::Failed { error })) => Err(error),
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(panic) => Err(format!("capability panicked: {}", panic_message(&*panic))),
        };

        // 后续只借用上下文: Worker 本身持有能力实例，不是 Sync
        let ctx = &self.ctx;
        match outcome {
            Ok(outcome) => on_success(ctx, self.id, &task, outcome).await,
            Err(reason) => on_failure(ctx, self.id, &task, reason).await,
        }
        true
    }
}

/// 发布成功结果，分类任务再回收上传文件
async fn on_success(ctx: &PoolContext, worker_id: usize, task: &TaskData, outcome: TaskOutcome) {
    let metrics = &ctx.base.metrics;

    if let Err(e) = ctx.publisher.publish(task, outcome).await {
        metrics.inc_publish_error();
        error!(task_id = %task.id, "[Worker-{}-{}] Publish failed: {}", ctx.kind, worker_id, e);
        return;
    }
    metrics.inc_success();
    info!(task_id = %task.id, key = %task.result_key(), "[Worker-{}-{}] Result published", ctx.kind, worker_id);

    // 结果写成功之后才回收上传文件
    if task.kind.owns_upload() {
        if let Err(e) = tokio::fs::remove_file(&task.filename).await {
            metrics.inc_cleanup_failure();
            warn!(
                task_id = %task.id,
                file = %task.filename.display(),
                "[Worker-{}-{}] Cleanup failed: {}", ctx.kind, worker_id, e
            );
        }
    }
}

async fn on_failure(ctx: &PoolContext, worker_id: usize, task: &TaskData, reason: String) {
    let metrics = &ctx.base.metrics;
    metrics.inc_failure();
    error!(task_id = %task.id, "[Worker-{}-{}] Task failed: {}", ctx.kind, worker_id, reason);

    if !ctx.base.config.policy.publish_failures {
        return;
    }
    let outcome = TaskOutcome::Failed { error: reason };
    if let Err(e) = ctx.publisher.publish(task, outcome).await {
        metrics.inc_publish_error();
        error!(task_id = %task.id, "[Worker-{}-{}] Publish failure status failed: {}", ctx.kind, worker_id, e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

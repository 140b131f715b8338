use std::path::Path;

use crate::common::model::{TaskData, TaskOutcome};

// ==========================================
// 1. 能力接口 (Capability)
// ==========================================

/// 能力接口 (推理 / 分割)
///
/// 一个实例即一份已加载的模型，由单个 Worker 独占，因此方法拿的是 `&mut self`，
/// 实现方不需要任何内部锁。
///
/// # 执行环境
/// `execute` 会在 `spawn_blocking` 线程上被调用，可以放心做同步的 CPU / 进程调用。
///
/// # 返回值
/// - `Ok(outcome)`: 执行成功，Worker 发布结果。
/// - `Err(e)`: 执行失败，Worker 记录日志，按策略决定是否发布 `Failed`。
pub trait Capability: Send + 'static {
    fn execute(&mut self, task: &TaskData) -> anyhow::Result<TaskOutcome>;
}

// ==========================================
// 2. 能力加载器 (CapabilityLoader)
// ==========================================

/// 能力加载器
///
/// 每个 Worker 启动时调用一次 `load`，拿到属于自己的实例。
/// 任何一个实例加载失败都会让引擎拒绝启动。
pub trait CapabilityLoader: Send + Sync + 'static {
    fn load(&self, model_dir: &Path) -> anyhow::Result<Box<dyn Capability>>;
}

/// 闭包即加载器，方便测试和简单场景
impl<F> CapabilityLoader for F
where
    F: Fn(&Path) -> anyhow::Result<Box<dyn Capability>> + Send + Sync + 'static,
{
    fn load(&self, model_dir: &Path) -> anyhow::Result<Box<dyn Capability>> {
        self(model_dir)
    }
}

use crate::common::JobKind;
use crate::driver::DriverContext;
use crate::scheduler::publisher::ResultPublisher;

/// 单个工作池共享的上下文
///
/// 在 `DriverContext` 的全局资源之上，加上池的类型和结果发布器。
#[derive(Clone)]
pub struct PoolContext {
    pub kind: JobKind,
    pub base: DriverContext,
    pub publisher: ResultPublisher,
}

impl PoolContext {
    pub fn new(kind: JobKind, base: DriverContext, publisher: ResultPublisher) -> Self {
        Self {
            kind,
            base,
            publisher,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.base.is_shutdown()
    }
}

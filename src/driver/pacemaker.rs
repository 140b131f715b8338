use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::policy::{WaitContext, WaitDecision, WaitStrategy};

/// 任务起搏器
///
/// 核心职责：负责驱动 Ingest 的执行节奏。
/// 它根据 WaitStrategy 的决策，决定是立刻再拉一轮还是先睡一会儿。
pub struct TaskPacemaker<'a> {
    /// 关机信号
    shutdown: &'a CancellationToken,

    /// 等待策略
    wait_strategy: Arc<dyn WaitStrategy>,

    /// 连续空闲计数器
    idle_count: u32,
}

impl<'a> TaskPacemaker<'a> {
    pub fn new(shutdown: &'a CancellationToken, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            shutdown,
            wait_strategy,
            idle_count: 0,
        }
    }

    /// 本轮拉到了东西
    pub fn mark_busy(&mut self) {
        self.idle_count = 0;
    }

    /// 本轮所有队列都是空的 (或者出错)
    pub fn mark_idle(&mut self) {
        self.idle_count = self.idle_count.saturating_add(1);
    }

    pub fn idle_count(&self) -> u32 {
        self.idle_count
    }

    /// 等待下一次动作触发
    pub async fn wait_next(&mut self) -> PacemakerEvent {
        if self.shutdown.is_cancelled() {
            return PacemakerEvent::Shutdown;
        }

        let ctx = WaitContext::new(self.idle_count);
        match self.wait_strategy.make_decision(&ctx) {
            WaitDecision::Immediate => PacemakerEvent::Trigger,
            WaitDecision::Sleep(duration) => {
                tokio::select! {
                    _ = self.shutdown.cancelled() => PacemakerEvent::Shutdown,
                    _ = tokio::time::sleep(duration) => PacemakerEvent::Trigger,
                }
            }
        }
    }
}

/// 起搏器产生的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacemakerEvent {
    /// [触发] 去拉取
    Trigger,
    /// [关闭] 系统停机
    Shutdown,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::policy::FixedWait;

    #[tokio::test(start_paused = true)]
    async fn idle_rounds_sleep_until_shutdown() {
        let token = CancellationToken::new();
        let mut pacemaker = TaskPacemaker::new(&token, Arc::new(FixedWait::new(1000)));

        assert_eq!(pacemaker.wait_next().await, PacemakerEvent::Trigger);

        pacemaker.mark_idle();
        let started = tokio::time::Instant::now();
        assert_eq!(pacemaker.wait_next().await, PacemakerEvent::Trigger);
        assert!(started.elapsed() >= Duration::from_millis(1000));

        token.cancel();
        assert_eq!(pacemaker.wait_next().await, PacemakerEvent::Shutdown);
    }
}

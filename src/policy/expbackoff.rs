use std::time::Duration;

use crate::policy::{WaitContext, WaitDecision, WaitStrategy};

/// 指数退避策略
///
/// - 随着连续空闲次数增加，等待时间呈指数级增长。
/// - 用于在系统长时间空闲时降低 Redis QPS 消耗。
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    /// 创建退避策略
    ///
    /// # 参数
    /// - `min_ms`: 第一次空闲时的等待时间
    /// - `max_ms`: 最大等待时间 (封顶值)
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms.max(min_ms)),
            factor: 2.0,
        }
    }

    /// 内部计算逻辑
    fn calculate_duration(&self, idle_count: u32) -> Duration {
        // min * factor^(idle_count - 1)，指数最大 30 防止溢出
        let exponent = idle_count.saturating_sub(1).min(30) as i32;
        let secs = self.min.as_secs_f64() * self.factor.powi(exponent);

        let duration = Duration::from_secs_f64(secs);
        if duration > self.max {
            self.max
        } else {
            duration
        }
    }
}

impl WaitStrategy for ExponentialBackoff {
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision {
        if ctx.idle_count == 0 {
            return WaitDecision::Immediate;
        }
        WaitDecision::Sleep(self.calculate_duration(ctx.idle_count))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(1000, 8000)
    }
}

pub mod expbackoff;
pub mod fixed;
pub mod wait;

pub use expbackoff::ExponentialBackoff;
pub use fixed::FixedWait;
pub use wait::{WaitContext, WaitDecision, WaitStrategy};

use crate::common::{PolicyConfig, PollStrategy};

/// 根据配置构造空闲轮询策略
///
/// 退避模式的封顶时长为轮询间隔的 8 倍。
pub fn from_config(policy: &PolicyConfig) -> Box<dyn WaitStrategy> {
    match policy.poll_strategy {
        PollStrategy::Fixed => Box::new(FixedWait::new(policy.poll_interval_ms)),
        PollStrategy::Backoff => Box::new(ExponentialBackoff::new(
            policy.poll_interval_ms,
            policy.poll_interval_ms.saturating_mul(8),
        )),
    }
}

use std::time::Duration;

use crate::policy::{WaitContext, WaitDecision, WaitStrategy};

/// 固定间隔策略
///
/// - 只要空闲，就固定睡 `interval`；忙的时候立即继续。
#[derive(Debug, Clone)]
pub struct FixedWait {
    interval: Duration,
}

impl FixedWait {
    pub fn new(millis: u64) -> Self {
        Self {
            interval: Duration::from_millis(millis),
        }
    }
}

impl WaitStrategy for FixedWait {
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision {
        if ctx.idle_count == 0 {
            WaitDecision::Immediate
        } else {
            WaitDecision::Sleep(self.interval)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeps_the_same_amount_every_idle_round() {
        let policy = FixedWait::new(1000);
        assert_eq!(
            policy.make_decision(&WaitContext::new(0)),
            WaitDecision::Immediate
        );
        for idle in [1, 2, 50] {
            assert_eq!(
                policy.make_decision(&WaitContext::new(idle)),
                WaitDecision::Sleep(Duration::from_secs(1))
            );
        }
    }
}

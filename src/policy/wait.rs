use std::time::Duration;

/// 等待决策 (The Decision)
///
/// - 策略层返回给 Ingest 的具体行动指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDecision {
    /// [立即执行]
    ///
    /// 含义: "不睡，马上再拉一轮。"
    ///
    /// - 行为: 直接返回，Ingest 立刻尝试下一轮出队。
    /// - 适用场景: 上一轮刚拿到任务，队列里大概率还有积压。
    Immediate,

    /// [休眠]
    ///
    /// 含义: "睡 duration 这么久再来。"
    /// - 行为: `sleep(duration)`，期间收到停机信号会提前醒来。
    /// - 说明: 队列没有推送通知，空闲时只能靠定时轮询发现新任务。
    Sleep(Duration),
}

/// 等待策略上下文
///
/// - 包含了 Ingest 当前的运行状态信息，供策略层决策时参考。
#[derive(Debug, Clone)]
pub struct WaitContext {
    /// 连续空闲次数
    ///
    /// 表示 Ingest 已经连续多少轮把所有入站队列都拉了一遍却一无所获。
    /// - 0: 刚拿到过任务 (忙碌状态)。
    /// - >0: 系统处于空闲状态。
    pub idle_count: u32,
}

impl WaitContext {
    pub fn new(idle_count: u32) -> Self {
        Self { idle_count }
    }
}

/// 等待策略接口 (The Interface)
///
/// - 决定了 Ingest 在什么情况下该等待多久。
pub trait WaitStrategy: Send + Sync + 'static {
    /// 核心决策方法
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision;
}

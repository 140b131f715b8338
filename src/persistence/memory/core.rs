use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

/// 结果条目: 值 + 过期时刻
pub(super) type ExpiringValue = (Vec<u8>, Instant);

/// 内存持久化实现 (In-Memory Persistence)
///
/// 同时实现了 `TaskQueue` 和 `ResultStore`，语义与 Redis 实现保持一致。
/// 主要用于测试和单机调试。
///
/// - 过期时间基于 `tokio::time::Instant`，测试里 `tokio::time::pause()` 后可以直接快进。
/// - 过期是惰性的：读到已过期的 Key 时顺手删除。
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    /// 【队列】队列名 -> FIFO
    /// - 单把锁即可，push/pop 都是 O(1) 的短操作
    pub(super) queues: Arc<Mutex<HashMap<String, VecDeque<Vec<u8>>>>>,

    /// 【结果】Key -> (值, 过期时刻)
    /// - DashMap: 分片锁，Worker 并发写结果不排队
    pub(super) results: Arc<DashMap<String, ExpiringValue>>,
}

impl MemoryPersistence {
    /// 创建一个新的内存持久化实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 队列中剩余条目 (测试辅助)
    pub fn pending_in(&self, queue: &str) -> usize {
        self.queues.lock().get(queue).map_or(0, |q| q.len())
    }

    /// 当前未过期的结果数量 (测试辅助)
    pub fn live_results(&self) -> usize {
        let now = Instant::now();
        self.results
            .iter()
            .filter(|entry| entry.value().1 > now)
            .count()
    }
}

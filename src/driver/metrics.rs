use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// 引擎核心指标
// 使用 Atomic 保证高并发下的计数性能
#[derive(Debug, Default)]
pub struct DriverMetrics {
    // --- 瞬时状态 (Gauges) ---
    /// 当前正在执行的任务数 (所有池合计)
    pub active_tasks: AtomicUsize,

    // --- Ingest 计数 (Counters) ---
    /// 从入站队列取出的条目总数 (含损坏条目)
    pub total_ingested: AtomicU64,

    /// 无法解码而丢弃的条目
    pub dropped_corrupt: AtomicU64,

    /// 类型未知或对应池未启用而丢弃的任务
    pub dropped_unroutable: AtomicU64,

    /// 成功送入某个池的任务
    pub total_routed: AtomicU64,

    // --- Worker 计数 (Counters) ---
    /// 执行成功并发布了结果
    pub total_success: AtomicU64,

    /// 能力执行失败 (含 panic)
    pub total_failure: AtomicU64,

    /// 结果写入失败
    pub publish_errors: AtomicU64,

    /// 临时文件回收失败
    pub cleanup_failures: AtomicU64,
}

impl DriverMetrics {
    /// 增加活跃数 (开始做任务)
    pub fn inc_active(&self) {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
    }

    /// 减少活跃数 (任务结束)
    pub fn dec_active(&self) {
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_ingested(&self) {
        self.total_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_corrupt(&self) {
        self.dropped_corrupt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unroutable(&self) {
        self.dropped_unroutable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_routed(&self) {
        self.total_routed.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录成功
    pub fn inc_success(&self) {
        self.total_success.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录失败
    pub fn inc_failure(&self) {
        self.total_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cleanup_failure(&self) {
        self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 导出当前快照 (用于日志和测试断言)
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            total_ingested: self.total_ingested.load(Ordering::Relaxed),
            dropped_corrupt: self.dropped_corrupt.load(Ordering::Relaxed),
            dropped_unroutable: self.dropped_unroutable.load(Ordering::Relaxed),
            total_routed: self.total_routed.load(Ordering::Relaxed),
            total_success: self.total_success.load(Ordering::Relaxed),
            total_failure: self.total_failure.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_tasks: usize,
    pub total_ingested: u64,
    pub dropped_corrupt: u64,
    pub dropped_unroutable: u64,
    pub total_routed: u64,
    pub total_success: u64,
    pub total_failure: u64,
    pub publish_errors: u64,
    pub cleanup_failures: u64,
}

use std::time::Duration;

use async_trait::async_trait;

use crate::common::error::Result;

// ==========================================
// 1. 任务队列接口 (TaskQueue)
// ==========================================

/// 任务队列接口
///
/// **职责**: 按名字区分的若干条持久化 FIFO 列表，存放序列化后的任务。
/// **特点**:
/// - 同一个队列内严格先进先出，不同队列之间没有顺序保证。
/// - `pop` 是非阻塞的，空队列返回 `None`，由调用方决定何时再来。
/// - 队列只搬运字节，解码失败的条目如何处置由 Ingest 决定。
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// 追加到队尾
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<()>;

    /// 取出队头 (最早入队的条目)
    ///
    /// 取出即移除。出队之后到结果发布之前进程崩溃，任务就丢了 (至多一次)。
    async fn pop(&self, queue: &str) -> Result<Option<Vec<u8>>>;

    /// 当前队列长度 (诊断用)
    async fn len(&self, queue: &str) -> Result<usize>;
}

// ==========================================
// 2. 结果存储接口 (ResultStore)
// ==========================================

/// 结果存储接口
///
/// **职责**: 带过期时间的 Key/Value 存储，Worker 写结果，轮询方读结果。
/// **特点**:
/// - 每个 Key 在写入时指定 TTL，到期后读不到，也不再占空间。
/// - `exists` 与 `get` 之间没有事务，Key 可能恰好在两次调用之间过期。
#[async_trait]
pub trait ResultStore: Send + Sync + 'static {
    /// 写入并设置过期时间，已存在则覆盖
    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Key 是否存在且未过期
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 读取值，不存在或已过期返回 `None`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

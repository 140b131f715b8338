use thiserror::Error;

use crate::common::JobKind;

/// 调度引擎统一结果类型
pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Error, Debug)]
pub enum DispatchError {
    // ==========================================
    // 1. 配置与启动错误 (Configuration & Startup)
    // ==========================================
    /// 配置错误
    ///
    /// - 触发场景: 参数校验不通过，或者 Redis URL 无法解析。
    /// - 后果: 引擎启动失败。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 模型加载失败
    ///
    /// - 触发场景: Worker 启动时模型目录缺文件、标签文件无法解析等。
    /// - 后果: **致命**。整个引擎拒绝启动，不允许带着缺失的模型提供服务。
    #[error("Failed to load model for {kind} worker {worker}: {reason}")]
    ModelLoad {
        kind: JobKind,
        worker: usize,
        reason: String,
    },

    /// 提交的任务不合法
    ///
    /// - 触发场景: ID 为空，或者任务类型无法识别。
    /// - 后果: 提交方直接收到错误，任务不会入队。
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// 引擎已停机
    ///
    /// - 触发场景: `shutdown()` 之后仍有组件尝试投递任务。
    #[error("Dispatch engine is shutting down.")]
    Shutdown,

    // ==========================================
    // 2. 基础设施与 IO 错误 (Infrastructure & IO)
    // ==========================================
    /// Redis 交互失败
    ///
    /// - 触发场景: 网络抖动、Redis 重启。
    /// - 处理: 暂时性错误，Ingest 会退避后继续轮询。
    #[error("Redis interaction failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// Redis 连接池错误
    #[error("Redis pool failed: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// 连接池创建失败
    #[error("Redis pool creation failed: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    /// 序列化/反序列化失败
    ///
    /// - 触发场景: 队列里的 JSON 损坏，或者结果记录结构不兼容。
    /// - 处理: 队列条目直接丢弃 (毒丸)；结果记录按暂时性服务端错误返回。
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 通用 IO 错误
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    // ==========================================
    // 3. 结果与执行错误 (Result & Execution)
    // ==========================================
    /// 结果在 exists 与 get 之间过期
    #[error("Result {0} disappeared before it could be read.")]
    ResultMissing(String),

    /// 阻塞线程异常退出
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl DispatchError {
    /// 是否是暂时性故障
    ///
    /// - `true`: 网络、连接池、IO、读结果时的竞争，稍后重试即可。
    /// - `false`: 配置、数据损坏、模型缺失，重试没有意义。
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Redis(e) => e.is_connection_dropped() || e.is_io_error(),
            DispatchError::Pool(_) => true,
            DispatchError::Io(_) => true,
            DispatchError::ResultMissing(_) => true,

            DispatchError::Config(_) => false,
            DispatchError::ModelLoad { .. } => false,
            DispatchError::InvalidTask(_) => false,
            DispatchError::Serialization(_) => false,
            DispatchError::CreatePool(_) => false,
            DispatchError::Shutdown => false,
            DispatchError::Join(_) => false,
        }
    }
}

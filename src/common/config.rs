use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::JobKind;

/// 空闲轮询策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStrategy {
    /// 固定间隔 (默认)
    ///
    /// - 所有入站队列都为空时，固定休眠 `poll_interval_ms`。
    Fixed,

    /// 指数退避
    ///
    /// - 连续空转次数越多，休眠越久，封顶 `poll_interval_ms * 8`。
    /// - 适用场景: 长时间无任务的节点，降低 Redis QPS。
    Backoff,
}

// ==========================================
// 1. 资源配置 (WorkerConfig)
// ==========================================

/// 工作池容量配置
///
/// 每个任务类型一个独立的池，池的大小即该类型的硬并发上限。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 普通分类 Worker 数量
    ///
    /// - 默认值: 5
    /// - 注意: 每个 Worker 独占一份模型实例，内存占用随之线性增长。
    pub classification_workers: usize,

    /// NSFW 分类 Worker 数量
    ///
    /// - 默认值: 3
    pub nsfw_workers: usize,

    /// Grabcut 分割 Worker 数量
    ///
    /// - 默认值: 2
    pub segmentation_workers: usize,

    /// 每个池的内存任务队列容量
    ///
    /// - 说明: Ingest 与 Dispatcher 之间 channel 的容量。
    /// - 默认值: 100
    /// - 影响: 队列满时 Ingest 阻塞 (背压)，积压留在 Redis 而不是内存里。
    pub queue_capacity: usize,
}

impl WorkerConfig {
    /// 某个任务类型的池大小，0 表示该类型不启用
    pub fn pool_size(&self, kind: JobKind) -> usize {
        match kind {
            JobKind::Classification => self.classification_workers,
            JobKind::NsfwClassification => self.nsfw_workers,
            JobKind::Segmentation => self.segmentation_workers,
            JobKind::Unknown => 0,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            classification_workers: 5,
            nsfw_workers: 3,
            segmentation_workers: 2,
            queue_capacity: 100,
        }
    }
}

// ==========================================
// 2. 存储配置 (RedisConfig)
// ==========================================

/// Redis 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// 连接地址
    ///
    /// - 默认值: `redis://127.0.0.1:6379`
    /// - 兼容旧参数 `:6379` / `host:port` 写法，见 [`RedisConfig::normalized_url`]。
    pub url: String,

    /// 连接池大小
    ///
    /// - 默认值: 10 (API 进程建议 50)
    pub pool_size: usize,
}

impl RedisConfig {
    /// 把 `:6379`、`host:6379` 这类裸地址补全成 `redis://` URL
    pub fn normalized_url(&self) -> String {
        let url = self.url.trim();
        if url.contains("://") {
            return url.to_string();
        }
        if let Some(port) = url.strip_prefix(':') {
            return format!("redis://127.0.0.1:{}", port);
        }
        format!("redis://{}", url)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 10,
        }
    }
}

// ==========================================
// 3. 策略配置 (PolicyConfig)
// ==========================================

/// 轮询与结果生命周期策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// 空闲轮询间隔 (毫秒)
    ///
    /// - 说明: 所有入站队列为空时 Ingest 的休眠时长。没有 Pub/Sub，纯轮询。
    /// - 默认值: 1000
    pub poll_interval_ms: u64,

    /// 空闲轮询策略
    pub poll_strategy: PollStrategy,

    /// 结果保存时长 (秒)
    ///
    /// - 说明: 结果写入后，无论是否被读取，到期即被丢弃。
    /// - 默认值: 3600
    pub result_ttl_secs: u64,

    /// 是否发布失败结果
    ///
    /// - 默认值: false (失败任务不写结果，轮询方永远看到 pending)
    /// - 开启后: 能力执行失败时写入 `Failed { error }`，轮询方可以区分失败和处理中。
    pub publish_failures: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            poll_strategy: PollStrategy::Fixed,
            result_ttl_secs: 3600,
            publish_failures: false,
        }
    }
}

// ==========================================
// 4. 模型目录 (ModelConfig)
// ==========================================

/// 每个任务类型的模型目录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub classification_dir: PathBuf,
    pub nsfw_dir: PathBuf,
    pub segmentation_dir: PathBuf,
}

impl ModelConfig {
    pub fn dir_for(&self, kind: JobKind) -> Option<&PathBuf> {
        match kind {
            JobKind::Classification => Some(&self.classification_dir),
            JobKind::NsfwClassification => Some(&self.nsfw_dir),
            JobKind::Segmentation => Some(&self.segmentation_dir),
            JobKind::Unknown => None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classification_dir: PathBuf::from("/home/playground/training/models/"),
            nsfw_dir: PathBuf::from("/home/playground/training/models/nsfw/"),
            segmentation_dir: PathBuf::from("/home/playground/training/models/grabcut/"),
        }
    }
}

// ==========================================
// 5. 队列命名 (QueueNames)
// ==========================================

/// 入站队列名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueNames {
    /// 分类请求 (classification / nsfw-classification)
    pub predict: String,
    /// Grabcut 请求
    pub grabcut: String,
}

impl QueueNames {
    /// 某个任务类型的入站队列
    pub fn inbound_for(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::Segmentation => &self.grabcut,
            _ => &self.predict,
        }
    }

    /// Ingest 需要轮询的全部队列 (去重，保持顺序)
    pub fn all(&self) -> Vec<String> {
        let mut names = vec![self.predict.clone()];
        if self.grabcut != self.predict {
            names.push(self.grabcut.clone());
        }
        names
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            predict: "predictme".to_string(),
            grabcut: "grabcutme".to_string(),
        }
    }
}

// ==========================================
// 6. 总配置入口 (DispatchConfig)
// ==========================================

/// 调度引擎总配置
///
/// 分层组织，支持 `serde`，可以直接从 JSON 加载；缺省字段走默认值。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub queues: QueueNames,
}

impl DispatchConfig {
    /// 启动前的参数校验
    pub fn validate(&self) -> crate::common::Result<()> {
        use crate::common::DispatchError;

        if self.worker.queue_capacity == 0 {
            return Err(DispatchError::Config(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        if self.policy.result_ttl_secs == 0 {
            return Err(DispatchError::Config(
                "result_ttl_secs must be greater than 0".into(),
            ));
        }
        if JobKind::ALL
            .iter()
            .all(|kind| self.worker.pool_size(*kind) == 0)
        {
            return Err(DispatchError::Config(
                "at least one worker pool must be enabled".into(),
            ));
        }
        Ok(())
    }
}

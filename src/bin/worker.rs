//! 调度 Worker 进程
//!
//! 启动顺序: 解析参数 -> 初始化日志 -> 连接 Redis -> 加载全部模型 -> 开始消费入站队列。
//! 任一模型加载失败进程直接以非 0 退出。

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use playground_dispatch::{
    capability::{ProcessClassifierLoader, ProcessSegmenterLoader},
    common::{
        DispatchConfig, JobKind, ModelConfig, PolicyConfig, PollStrategy, QueueNames, RedisConfig,
        WorkerConfig, init_tracing, shutdown_signal,
    },
    persistence::RedisPersistence,
    scheduler::EngineBuilder,
};

#[derive(Debug, Parser)]
#[command(name = "playground-worker", version)]
#[command(about = "Consumes image jobs from Redis and runs them on pooled models", long_about = None)]
struct Cli {
    /// Redis 地址，支持 `:6379` 简写
    #[arg(long, env = "REDIS_ADDRESS", default_value = ":6379")]
    redis_address: String,

    /// Redis 连接池大小
    #[arg(long, env = "REDIS_MAX_CONNECTIONS", default_value_t = 10)]
    redis_max_connections: usize,

    /// 每个池的内存队列容量
    #[arg(long, env = "MAX_WORKER_QUEUE_SIZE", default_value_t = 100)]
    max_worker_queue_size: usize,

    /// 普通分类 Worker 数量
    #[arg(long, env = "MAX_WORKERS", default_value_t = 5)]
    max_workers: usize,

    /// NSFW 分类 Worker 数量
    #[arg(long, env = "MAX_WORKERS_NSFW", default_value_t = 3)]
    max_workers_nsfw: usize,

    /// Grabcut Worker 数量
    #[arg(long, env = "MAX_WORKERS_GRABCUT", default_value_t = 2)]
    max_workers_grabcut: usize,

    #[arg(long, env = "MODELS_DIR", default_value = "/home/playground/training/models/")]
    models_dir: PathBuf,

    #[arg(long, env = "NSFW_MODELS_DIR", default_value = "/home/playground/training/models/nsfw/")]
    nsfw_models_dir: PathBuf,

    #[arg(long, env = "GRABCUT_MODELS_DIR", default_value = "/home/playground/training/models/grabcut/")]
    grabcut_models_dir: PathBuf,

    /// 入站队列为空时的轮询间隔 (毫秒)
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// 空闲时改用指数退避轮询
    #[arg(long, env = "POLL_BACKOFF")]
    poll_backoff: bool,

    /// 结果保存时长 (秒)
    #[arg(long, env = "RESULT_TTL_SECS", default_value_t = 3600)]
    result_ttl_secs: u64,

    /// 执行失败时也写入结果
    #[arg(long, env = "PUBLISH_FAILURES")]
    publish_failures: bool,

    #[arg(long, env = "PREDICT_QUEUE", default_value = "predictme")]
    predict_queue: String,

    #[arg(long, env = "GRABCUT_QUEUE", default_value = "grabcutme")]
    grabcut_queue: String,
}

impl Cli {
    fn into_config(self) -> DispatchConfig {
        DispatchConfig {
            worker: WorkerConfig {
                classification_workers: self.max_workers,
                nsfw_workers: self.max_workers_nsfw,
                segmentation_workers: self.max_workers_grabcut,
                queue_capacity: self.max_worker_queue_size,
            },
            redis: RedisConfig {
                url: self.redis_address,
                pool_size: self.redis_max_connections,
            },
            policy: PolicyConfig {
                poll_interval_ms: self.poll_interval_ms,
                poll_strategy: if self.poll_backoff {
                    PollStrategy::Backoff
                } else {
                    PollStrategy::Fixed
                },
                result_ttl_secs: self.result_ttl_secs,
                publish_failures: self.publish_failures,
            },
            models: ModelConfig {
                classification_dir: self.models_dir,
                nsfw_dir: self.nsfw_models_dir,
                segmentation_dir: self.grabcut_models_dir,
            },
            queues: QueueNames {
                predict: self.predict_queue,
                grabcut: self.grabcut_queue,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Cli::parse().into_config();
    init_tracing("info");

    info!(version = env!("CARGO_PKG_VERSION"), "[Worker] Starting");

    let persistence = RedisPersistence::new(&config.redis)?;
    persistence.ping().await?;
    info!("[Worker] Redis ready at {}", config.redis.normalized_url());

    let engine = EngineBuilder::new()
        .config(config)
        .persistence(persistence)
        .with_loader(JobKind::Classification, ProcessClassifierLoader)
        .with_loader(JobKind::NsfwClassification, ProcessClassifierLoader)
        .with_loader(JobKind::Segmentation, ProcessSegmenterLoader)
        .start()
        .await?;

    shutdown_signal().await;
    let metrics = engine.shutdown_and_wait().await;
    info!(
        success = metrics.total_success,
        failure = metrics.total_failure,
        "[Worker] Bye"
    );
    Ok(())
}

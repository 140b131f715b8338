//! HTTP 接入进程
//!
//! 接收上传、排队任务、返回结果，不加载任何模型。

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use playground_dispatch::{
    api::{ApiConfig, AppState, build_router},
    common::{QueueNames, RedisConfig, init_tracing, shutdown_signal},
    persistence::{RedisPersistence, ResultStore, TaskQueue},
    scheduler::TaskClient,
};

#[derive(Debug, Parser)]
#[command(name = "playground-api", version)]
#[command(about = "HTTP front end for the image job queue", long_about = None)]
struct Cli {
    /// 生产模式 (日志只保留 info 及以上)
    #[arg(long, env = "RELEASE")]
    release: bool,

    #[arg(long, env = "REDIS_ADDRESS", default_value = ":6379")]
    redis_address: String,

    #[arg(long, env = "REDIS_MAX_CONNECTIONS", default_value_t = 50)]
    redis_max_connections: usize,

    /// 分类上传的临时目录
    #[arg(long, env = "PREDICTIONS_DIR", default_value = "../predictions/")]
    predictions_dir: PathBuf,

    /// 已捐赠图片目录
    #[arg(long, env = "DONATIONS_DIR", default_value = "../../imagemonkey-core/donations/")]
    donations_dir: PathBuf,

    /// CORS Access-Control-Allow-Origin，逗号分隔
    #[arg(long, env = "CORS_ALLOW_ORIGIN", default_value = "*")]
    cors_allow_origin: String,

    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    listen_host: String,

    #[arg(long, env = "LISTEN_PORT", default_value_t = 8082)]
    listen_port: u16,

    /// 单个请求体上限 (字节)
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    max_upload_bytes: usize,

    #[arg(long, env = "PREDICT_QUEUE", default_value = "predictme")]
    predict_queue: String,

    #[arg(long, env = "GRABCUT_QUEUE", default_value = "grabcutme")]
    grabcut_queue: String,
}

impl Cli {
    fn into_config(self) -> ApiConfig {
        ApiConfig {
            listen_port: self.listen_port,
            listen_host: self.listen_host,
            predictions_dir: self.predictions_dir,
            donations_dir: self.donations_dir,
            cors_allow_origin: self.cors_allow_origin,
            max_upload_bytes: self.max_upload_bytes,
            redis: RedisConfig {
                url: self.redis_address,
                pool_size: self.redis_max_connections,
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
    let cli = Cli::parse();
    init_tracing(if cli.release {
        "info"
    } else {
        "debug,tower_http=debug"
    });
    let config = cli.into_config();

    info!(version = env!("CARGO_PKG_VERSION"), "[Api] Starting");

    tokio::fs::create_dir_all(&config.predictions_dir)
        .await
        .with_context(|| format!("couldn't create {}", config.predictions_dir.display()))?;

    let persistence = RedisPersistence::new(&config.redis)?;
    persistence.ping().await?;
    let queue: Arc<dyn TaskQueue> = Arc::new(persistence.clone());
    let store: Arc<dyn ResultStore> = Arc::new(persistence);
    let client = TaskClient::new(queue, store, config.queues.clone());

    let addr: SocketAddr = format!("{}:{}", config.listen_host, config.listen_port)
        .parse()
        .context("invalid listen address")?;
    let app = build_router(AppState::new(client, config))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("couldn't bind {}", addr))?;
    info!("[Api] Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[Api] Stopped");
    Ok(())
}

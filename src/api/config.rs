use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::{QueueNames, RedisConfig};

/// HTTP 接入层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 监听端口
    ///
    /// - 默认值: 8082
    pub listen_port: u16,

    /// 监听地址
    pub listen_host: String,

    /// 分类上传的临时目录，文件名即任务 ID
    pub predictions_dir: PathBuf,

    /// 已捐赠图片目录，grabcut 的目标图片从这里取
    pub donations_dir: PathBuf,

    /// CORS 允许的来源，逗号分隔；`*` 表示任意来源 (启动时会告警)
    pub cors_allow_origin: String,

    /// 单个请求体上限 (字节)
    ///
    /// - 默认值: 20 MiB
    pub max_upload_bytes: usize,

    /// Redis 连接 (API 进程默认连接池 50)
    pub redis: RedisConfig,

    /// 入站队列名，必须与 Worker 进程一致
    pub queues: QueueNames,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_port: 8082,
            listen_host: "0.0.0.0".to_string(),
            predictions_dir: PathBuf::from("../predictions/"),
            donations_dir: PathBuf::from("../../imagemonkey-core/donations/"),
            cors_allow_origin: "*".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
            redis: RedisConfig {
                pool_size: 50,
                ..RedisConfig::default()
            },
            queues: QueueNames::default(),
        }
    }
}

impl ApiConfig {
    /// 解析 CORS 来源列表，`None` 表示任意来源
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_allow_origin
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }
}

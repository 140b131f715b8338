use deadpool_redis::{Config, Pool, PoolConfig, Runtime};

use crate::common::config::RedisConfig;
use crate::common::error::Result;

/// Redis 持久化实现
///
/// 同时实现了 `TaskQueue` (List: RPUSH / LPOP) 和 `ResultStore` (String: SET EX / EXISTS / GET)。
/// 内部只持有连接池，Clone 是廉价的。
#[derive(Clone)]
pub struct RedisPersistence {
    /// Redis 连接池
    pub(super) pool: Pool,
}

impl RedisPersistence {
    /// 根据配置创建连接池
    ///
    /// 只创建池，不会立即建立连接；第一次取连接时才会真正连上 Redis。
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let mut cfg = Config::from_url(config.normalized_url());
        cfg.pool = Some(PoolConfig::new(config.pool_size.max(1)));
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    /// 连通性检查 (PING)
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        deadpool_redis::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPersistence")
            .field("pool", &self.pool.status())
            .finish()
    }
}

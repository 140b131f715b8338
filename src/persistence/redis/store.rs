use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

use super::core::RedisPersistence;
use crate::common::error::Result;
use crate::persistence::traits::ResultStore;

#[async_trait]
impl ResultStore for RedisPersistence {
    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.pool.get().await?;
        // SETEX 的最小粒度是秒，不足 1 秒按 1 秒算
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<Vec<u8>> = conn.get(key).await?;
        Ok(raw)
    }
}

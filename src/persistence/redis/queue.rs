use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

use super::core::RedisPersistence;
use crate::common::error::Result;
use crate::persistence::traits::TaskQueue;

#[async_trait]
impl TaskQueue for RedisPersistence {
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.rpush::<_, _, ()>(queue, payload).await?;
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        // LPOP 不带 count，空列表返回 nil
        let raw: Option<Vec<u8>> = conn.lpop(queue, None).await?;
        Ok(raw)
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let mut conn = self.pool.get().await?;
        let n: usize = conn.llen(queue).await?;
        Ok(n)
    }
}

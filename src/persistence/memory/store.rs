use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::MemoryPersistence;
use crate::common::error::Result;
use crate::persistence::traits::ResultStore;

impl MemoryPersistence {
    /// 读取未过期的值，顺手清理已过期的 Key
    fn live_value(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        if let Some(entry) = self.results.get(key) {
            if entry.1 > now {
                return Some(entry.0.clone());
            }
        } else {
            return None;
        }
        // 读锁已释放，可以安全删除
        self.results.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        None
    }

    /// 清掉所有已过期的 Key
    ///
    /// 每次写入时调用，没人再读的结果也不会一直留在内存里。
    fn sweep_expired(&self, now: Instant) {
        self.results.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl ResultStore for MemoryPersistence {
    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = Instant::now();
        self.sweep_expired(now);
        let expires_at = now + ttl;
        self.results
            .insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.live_value(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() {
        let mem = MemoryPersistence::new();
        mem.put_with_ttl("predictabc", b"{}", Duration::from_secs(3600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(mem.exists("predictabc").await.unwrap());
        assert_eq!(mem.get("predictabc").await.unwrap().as_deref(), Some(&b"{}"[..]));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!mem.exists("predictabc").await.unwrap());
        assert_eq!(mem.get("predictabc").await.unwrap(), None);
        assert_eq!(mem.live_results(), 0);
    }

    #[tokio::test]
    async fn rewrite_replaces_value() {
        let mem = MemoryPersistence::new();
        let ttl = Duration::from_secs(60);
        mem.put_with_ttl("k", b"1", ttl).await.unwrap();
        mem.put_with_ttl("k", b"2", ttl).await.unwrap();
        assert_eq!(mem.get("k").await.unwrap().as_deref(), Some(&b"2"[..]));
        assert_eq!(mem.live_results(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unread_results_are_swept_on_write() {
        let mem = MemoryPersistence::new();
        mem.put_with_ttl("predictold", b"{}", Duration::from_secs(1))
            .await
            .unwrap();
        mem.put_with_ttl("predictkeep", b"{}", Duration::from_secs(60))
            .await
            .unwrap();

        // 过期但从未被读过
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(mem.results.len(), 2);

        mem.put_with_ttl("predictnew", b"{}", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(mem.results.len(), 2);
        assert!(!mem.results.contains_key("predictold"));
        assert!(mem.results.contains_key("predictkeep"));
    }
}

use async_trait::async_trait;

use super::MemoryPersistence;
use crate::common::error::Result;
use crate::persistence::traits::TaskQueue;

#[async_trait]
impl TaskQueue for MemoryPersistence {
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .queues
            .lock()
            .get_mut(queue)
            .and_then(|q| q.pop_front()))
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        Ok(self.pending_in(queue))
    }
}

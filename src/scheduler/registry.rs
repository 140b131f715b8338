use tokio::sync::{mpsc, oneshot};

use crate::common::TaskData;

/// 空闲 Worker 令牌
///
/// Worker 每次空闲时创建一个，送进所属池的登记 channel。
/// Dispatcher 取出令牌后，通过里面的一次性 channel 把任务直接交给这个 Worker。
/// 令牌只能用一次；Worker 退出后令牌自然作废。
#[derive(Debug)]
pub struct WorkerSlot {
    /// 池内编号
    pub worker_id: usize,
    handoff: oneshot::Sender<TaskData>,
}

impl WorkerSlot {
    /// 创建令牌，返回 Worker 侧用于接收任务的一端
    pub fn new(worker_id: usize) -> (Self, oneshot::Receiver<TaskData>) {
        let (handoff, rx) = oneshot::channel();
        (Self { worker_id, handoff }, rx)
    }

    /// 把任务交给令牌对应的 Worker
    ///
    /// Worker 已经不在时原样退回任务，调用方应换下一个令牌重试。
    pub fn hand_off(self, task: TaskData) -> std::result::Result<(), TaskData> {
        self.handoff.send(task)
    }

    /// Worker 是否已经放弃了这个令牌
    pub fn is_stale(&self) -> bool {
        self.handoff.is_closed()
    }
}

/// 创建一个池的空闲登记 channel
///
/// 容量等于池大小: 每个 Worker 同一时刻最多挂一个令牌，登记永远不会阻塞。
pub fn idle_registry(pool_size: usize) -> (mpsc::Sender<WorkerSlot>, mpsc::Receiver<WorkerSlot>) {
    mpsc::channel(pool_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::JobKind;

    #[test]
    fn stale_slot_returns_the_task() {
        let (slot, rx) = WorkerSlot::new(0);
        drop(rx);
        assert!(slot.is_stale());

        let task = TaskData::new(JobKind::Classification, "/tmp/x");
        let back = slot.hand_off(task.clone()).unwrap_err();
        assert_eq!(back, task);
    }

    #[tokio::test]
    async fn live_slot_delivers_exactly_once() {
        let (slot, rx) = WorkerSlot::new(3);
        let task = TaskData::new(JobKind::Segmentation, "/tmp/y");
        slot.hand_off(task.clone()).unwrap();
        assert_eq!(rx.await.unwrap(), task);
    }
}

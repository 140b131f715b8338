use crate::common::TaskData;

/// 出队状态
#[derive(Debug)]
pub enum PopStatus {
    /// 拿到一条可以解码的任务
    Task(TaskData),
    /// 队列为空
    Empty,
    /// 数据损坏：拿到了条目但无法解析 (毒丸，直接丢弃)
    Corrupted { reason: String, raw_content: String },
}

impl PopStatus {
    /// 把原始出队结果解码成 `PopStatus`
    pub fn decode(raw: Option<Vec<u8>>) -> Self {
        match raw {
            None => PopStatus::Empty,
            Some(bytes) => match serde_json::from_slice::<TaskData>(&bytes) {
                Ok(task) => PopStatus::Task(task),
                Err(e) => PopStatus::Corrupted {
                    reason: e.to_string(),
                    raw_content: String::from_utf8_lossy(&bytes).into_owned(),
                },
            },
        }
    }
}

use uuid::Uuid;

// ==========================================
// ID 生成工具 (Identity Utilities)
// ==========================================

/// 生成全局唯一的任务 ID (UUID v4)
///
/// 客户端拿这个 ID 轮询结果，同时它也是上传文件的落盘文件名。
#[inline]
pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// 获取当前机器的主机名
///
/// 用于日志里标识是哪个节点在消费队列。
pub fn get_hostname() -> String {
    hostname::get()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| format!("node-{}", &new_task_id()[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique_uuids() {
        let a = new_task_id();
        let b = new_task_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}

use chrono::Utc;

/// 全局统一的时间工具
pub struct TimeUtils;

impl TimeUtils {
    /// 当前 Unix 时间戳 (秒)
    ///
    /// 全系统统一从这里取“现在”，只用于任务的 `created` 字段。
    pub fn now_secs() -> i64 {
        Utc::now().timestamp()
    }
}

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// 初始化全局日志
///
/// 优先读取 `RUST_LOG`，没有设置时使用 `default_filter`。
/// 重复调用是安全的 (测试里多次初始化不会 panic)。
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod signal;
pub mod time;
pub mod traits;
pub(crate) mod utils;

// 导出配置
pub use config::{
    DispatchConfig, ModelConfig, PolicyConfig, PollStrategy, QueueNames, RedisConfig, WorkerConfig,
};

// 导出错误类型
pub use error::{DispatchError, Result};

// 导出核心模型
pub use model::{JobKind, ModelInfo, TaskData, TaskOutcome, TaskResult};

// 导出用户需实现的 Trait
pub use traits::{Capability, CapabilityLoader};

pub use logging::init_tracing;
pub use signal::shutdown_signal;
pub use time::TimeUtils;
// 内部工具的快捷访问
pub use utils::new_task_id;
pub(crate) use utils::get_hostname;

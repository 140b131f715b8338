pub mod context;
pub mod core;
pub mod metrics;
pub mod pacemaker;

pub use context::DriverContext;
pub use self::core::IngestDriver;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pacemaker::{PacemakerEvent, TaskPacemaker};

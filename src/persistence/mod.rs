pub mod memory;
pub mod model;
pub mod redis;
pub mod traits;

pub use memory::MemoryPersistence;
pub use model::PopStatus;
pub use redis::RedisPersistence;
pub use traits::{ResultStore, TaskQueue};

pub mod builder;
pub mod client;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod publisher;
pub mod registry;
pub mod worker;

pub use builder::EngineBuilder;
pub use client::{PollStatus, TaskClient};
pub use dispatcher::Dispatcher;
pub use engine::Engine;
pub use publisher::ResultPublisher;
pub use registry::WorkerSlot;
pub use worker::PoolWorker;

// 1. 基础模块
pub mod common;

// 2. 核心接口与实现
pub mod driver;
pub mod persistence;
pub mod policy;

// 3. 调度器核心
pub mod scheduler;

// 4. 能力实现与 HTTP 接入层
pub mod api;
pub mod capability;

//! Memory Layer - In-Memory State Management
//!
//! 实现 TaskStore，管理任务生命周期与终态结果的内存状态

mod task_store;

pub use task_store::InMemoryTaskStore;

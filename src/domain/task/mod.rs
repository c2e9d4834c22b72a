//! Task Context - 任务限界上下文
//!
//! 职责:
//! - 任务聚合与状态机
//! - 结果记录
//! - 后端结果归一化

mod aggregate;
mod errors;
pub mod normalizer;
mod value_objects;

pub use aggregate::Task;
pub use errors::TaskError;
pub use normalizer::{normalize, ResultSchema};
pub use value_objects::{ResultRecord, TaskStatus};

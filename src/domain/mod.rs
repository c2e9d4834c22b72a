//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Submission Context: 输入图片批量
//! - Task Context: 处理任务与结果

pub mod submission;
pub mod task;

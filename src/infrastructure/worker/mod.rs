//! Worker Layer - Background Task Processing
//!
//! 实现 PollWorker，在后台轮询已派发任务的结果

mod poll_worker;

pub use poll_worker::{PollWorker, PollWorkerConfig, SHUTDOWN_GRACE};

//! Task Store Port - 任务生命周期管理
//!
//! 定义任务存储的抽象接口，具体实现在 infrastructure/memory 层

use thiserror::Error;

use crate::domain::task::{ResultRecord, Task, TaskError, TaskStatus};

/// Task Store 错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Transition(#[from] TaskError),
}

/// Task Store Port
///
/// 管理任务生命周期，终态结果只记录一次
pub trait TaskStorePort: Send + Sync {
    /// 保存新任务；已派发的任务进入轮询队列
    fn submit(&self, task: Task) -> Result<(), StoreError>;

    /// 获取任务快照
    fn get(&self, task_id: &str) -> Option<Task>;

    /// 为降级任务绑定远程任务 ID，并进入轮询队列
    fn attach_remote(&self, task_id: &str, remote_task_id: &str) -> Result<Task, StoreError>;

    /// 记录派发失败原因
    fn record_dispatch_error(&self, task_id: &str, reason: &str) -> Result<Task, StoreError>;

    /// 设置任务状态
    fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError>;

    /// 标记完成并保存结果
    ///
    /// 已完成的任务返回首次保存的结果，不覆盖
    fn complete(&self, task_id: &str, record: ResultRecord) -> Result<ResultRecord, StoreError>;

    /// 标记永久失败
    fn fail(&self, task_id: &str, reason: &str) -> Result<(), StoreError>;

    /// 获取已完成任务的结果
    fn get_result(&self, task_id: &str) -> Option<ResultRecord>;

    /// 列出所有任务 ID
    fn list_all(&self) -> Vec<String>;
}

//! Task Context - Errors

use thiserror::Error;

use super::TaskStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Invalid state transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {0} already has a dispatched job")]
    AlreadyDispatched(String),
}

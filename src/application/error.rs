//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{CompressError, StoreError};
use crate::domain::submission::ArtifactError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 文件类型或大小不合法，提交未开始
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 会话或签名失败，任务未创建
    #[error("Protection error: {0}")]
    ProtectionError(String),

    /// 数据已保护但任务未派发，可凭地址重试
    #[error("Submission degraded for task {task_id}: {reason} (protected data: {protected_address})")]
    SubmissionDegraded {
        task_id: String,
        protected_address: String,
        reason: String,
    },

    /// 轮询超时（后端未进入终态）
    #[error("Polling timed out after {waited_ms}ms for task {task_id}")]
    PollTimeout { task_id: String, waited_ms: u64 },

    /// 后端永久失败
    #[error("Task {task_id} failed: {reason}")]
    PollFailed { task_id: String, reason: String },

    /// 调用方取消
    #[error("Polling cancelled for task {0}")]
    Cancelled(String),

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建保护错误
    pub fn protection(message: impl Into<String>) -> Self {
        Self::ProtectionError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<ArtifactError> for ApplicationError {
    fn from(err: ArtifactError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<CompressError> for ApplicationError {
    fn from(err: CompressError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::not_found("Task", id),
            StoreError::Transition(e) => Self::InvalidState(e.to_string()),
            other => Self::InternalError(other.to_string()),
        }
    }
}

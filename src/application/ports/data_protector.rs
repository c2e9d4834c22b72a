//! Data Protector Port - 受保护数据与远程任务抽象
//!
//! 定义数据保护、授权、任务派发与结果获取的抽象接口，
//! 具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::submission::ProtectedPayload;

/// Data Protector 错误
///
/// 按是否值得重试分类，轮询时据此区分"未就绪"和"永久失败"
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtectorError {
    /// 结果尚未就绪
    #[error("Result not ready: {0}")]
    NotReady(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// 服务暂时不可用（限流、5xx）
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// 签名被拒或会话无效
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// 任务永久失败
    #[error("Permanent failure: {0}")]
    Permanent(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProtectorError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtectorError::NotReady(_)
                | ProtectorError::Network(_)
                | ProtectorError::Timeout
                | ProtectorError::Unavailable(_)
        )
    }
}

/// 保护结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedData {
    /// 受保护数据地址
    pub address: String,
}

/// 授权请求
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub protected_data: String,
    pub authorized_app: String,
    pub authorized_user: String,
}

/// 任务派发请求
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub protected_data: String,
    pub app: String,
    pub args: String,
}

/// Data Protector Port
///
/// 外部机密计算服务的抽象接口
#[async_trait]
pub trait DataProtectorPort: Send + Sync {
    /// 加密并上传数据，返回受保护数据地址
    async fn protect(&self, payload: &ProtectedPayload) -> Result<ProtectedData, ProtectorError>;

    /// 授权指定应用与用户访问受保护数据
    async fn grant_access(&self, request: &GrantRequest) -> Result<(), ProtectorError>;

    /// 派发处理任务，返回远程任务 ID
    async fn process_protected_data(&self, request: &ProcessRequest)
        -> Result<String, ProtectorError>;

    /// 获取已完成任务的结果
    async fn get_result(&self, task_id: &str) -> Result<Value, ProtectorError>;

    /// 检查服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ProtectorError::NotReady("202".into()).is_retryable());
        assert!(ProtectorError::Timeout.is_retryable());
        assert!(ProtectorError::Unavailable("503".into()).is_retryable());
        assert!(!ProtectorError::Permanent("app crashed".into()).is_retryable());
        assert!(!ProtectorError::Rejected("bad signature".into()).is_retryable());
        assert!(!ProtectorError::InvalidResponse("not json".into()).is_retryable());
    }
}

//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::domain::task::ResultRecord;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// KYC DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskResultRequest {
    pub task_id: String,
    /// 最长等待秒数，缺省使用配置值
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RetryDispatchRequest {
    pub task_id: String,
    /// 手动派发得到的远程任务 ID
    pub remote_task_id: Option<String>,
}

/// 结果响应
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub task_id: String,
    pub passport_number: String,
    pub country: String,
    pub wallet: String,
    pub verified: bool,
    pub fields: std::collections::BTreeMap<String, String>,
    pub completed_at: String,
}

impl From<ResultRecord> for ResultResponse {
    fn from(record: ResultRecord) -> Self {
        let text = |key: &str| {
            record
                .field(key)
                .unwrap_or(crate::domain::task::normalizer::UNKNOWN)
                .to_string()
        };
        Self {
            passport_number: text("passport_number"),
            country: text("country"),
            wallet: text("wallet"),
            task_id: record.task_id.clone(),
            verified: record.verified,
            completed_at: record.completed_at.to_rfc3339(),
            fields: record.fields,
        }
    }
}

//! Submission Commands - 提交相关命令

use crate::application::ports::{CompressionBudget, GrantRequest, ProcessRequest};
use crate::domain::submission::{BatchLimits, InputArtifact};

/// 提交批次命令
#[derive(Debug, Clone)]
pub struct SubmitBatchCommand {
    pub artifacts: Vec<InputArtifact>,
}

/// 重试派发命令
///
/// 携带 `remote_task_id` 时表示运维已通过命令行手动派发，只需绑定
#[derive(Debug, Clone)]
pub struct RetryDispatchCommand {
    pub task_id: String,
    pub remote_task_id: Option<String>,
}

/// 处理目标
#[derive(Debug, Clone)]
pub struct DispatchTarget {
    /// enclave 应用地址
    pub app_address: String,
    /// 额外授权的用户（应用钱包）
    pub authorized_user: Option<String>,
    /// 传给应用的参数
    pub args: String,
    /// 手动派发使用的命令行工具
    pub cli_program: String,
}

impl Default for DispatchTarget {
    fn default() -> Self {
        Self {
            app_address: "0x77E4126768A17585170f0Fe190f052327070babE".to_string(),
            authorized_user: None,
            args: "process_passport".to_string(),
            cli_program: "iapp".to_string(),
        }
    }
}

impl DispatchTarget {
    pub fn process_request(&self, protected_data: &str) -> ProcessRequest {
        ProcessRequest {
            protected_data: protected_data.to_string(),
            app: self.app_address.clone(),
            args: self.args.clone(),
        }
    }

    pub fn grant_request(&self, protected_data: &str) -> Option<GrantRequest> {
        self.authorized_user.as_ref().map(|user| GrantRequest {
            protected_data: protected_data.to_string(),
            authorized_app: self.app_address.clone(),
            authorized_user: user.clone(),
        })
    }
}

/// 提交流程参数
#[derive(Debug, Clone, Default)]
pub struct SubmissionSettings {
    pub limits: BatchLimits,
    pub budget: CompressionBudget,
    pub target: DispatchTarget,
    /// 要求的网络 chain id，None 表示不检查
    pub required_chain_id: Option<u64>,
}

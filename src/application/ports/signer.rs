//! Signer Port - 会话与签名能力

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Session not connected")]
    NotConnected,

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Signer Port
///
/// 当前账户与签名能力；数据保护和任务派发前必须可用
#[async_trait]
pub trait SignerPort: Send + Sync {
    /// 当前账户，未连接时为 None
    fn account(&self) -> Option<String>;

    /// 当前网络 chain id
    fn chain_id(&self) -> u64;

    /// 对消息签名，返回十六进制签名
    ///
    /// 实现必须串行化签名请求
    async fn sign(&self, message: &[u8]) -> Result<String, SignerError>;
}

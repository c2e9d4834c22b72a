//! Local Session Signer - 基于共享密钥的会话签名
//!
//! 签名 = hex(sha256(secret || message))；网关持有相同密钥进行校验

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::application::ports::{SignerError, SignerPort};

/// Local Session Signer
///
/// 账户与网络在启动时确定；签名请求通过异步互斥锁串行执行
pub struct LocalSessionSigner {
    account: Option<String>,
    chain_id: u64,
    secret: String,
    /// 已签名次数（同时作为串行化的锁）
    signed: Mutex<u64>,
}

impl LocalSessionSigner {
    pub fn new(account: Option<String>, chain_id: u64, secret: impl Into<String>) -> Self {
        Self {
            account: account.filter(|a| !a.trim().is_empty()),
            chain_id,
            secret: secret.into(),
            signed: Mutex::new(0),
        }
    }

    fn digest(&self, message: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(message);
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl SignerPort for LocalSessionSigner {
    fn account(&self) -> Option<String> {
        self.account.clone()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn sign(&self, message: &[u8]) -> Result<String, SignerError> {
        if self.account.is_none() {
            return Err(SignerError::NotConnected);
        }
        if self.secret.is_empty() {
            return Err(SignerError::SigningFailed("empty session secret".to_string()));
        }

        let mut signed = self.signed.lock().await;
        *signed += 1;
        tracing::trace!(count = *signed, message_len = message.len(), "Signing request");

        Ok(self.digest(message))
    }
}

//! Fake Protector Client - 用于本地运行和测试的数据保护服务
//!
//! 不实际加密或上传，地址与任务 ID 按顺序生成；
//! 结果在被查询若干次之后才就绪

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

use crate::application::ports::{
    DataProtectorPort, GrantRequest, ProcessRequest, ProtectedData, ProtectorError,
};
use crate::domain::submission::ProtectedPayload;

/// Fake Protector 配置
#[derive(Debug, Clone)]
pub struct FakeProtectorConfig {
    /// 结果就绪前返回 NotReady 的次数
    pub ready_after_polls: u32,
    pub fail_protect: bool,
    pub fail_grant: bool,
    /// 派发失败（服务不可用）
    pub fail_dispatch: bool,
    /// 结果查询返回永久失败
    pub fail_permanently: bool,
    /// 每次调用的模拟延迟（毫秒）
    pub latency_ms: u64,
    /// 就绪后返回的结果
    pub result: Value,
}

impl Default for FakeProtectorConfig {
    fn default() -> Self {
        Self {
            ready_after_polls: 0,
            fail_protect: false,
            fail_grant: false,
            fail_dispatch: false,
            fail_permanently: false,
            latency_ms: 0,
            result: json!({
                "passport_number": "P1234567",
                "country": "FRA",
                "verified": true,
                "all_text": ["PASSPORT", "P1234567", "FRA"],
            }),
        }
    }
}

/// Fake Protector Client
pub struct FakeProtectorClient {
    config: FakeProtectorConfig,
    fail_dispatch: AtomicBool,
    sequence: AtomicU64,
    /// 每个远程任务已被查询的次数
    polls: DashMap<String, u32>,
    last_payload: Mutex<Option<ProtectedPayload>>,
    protect_calls: AtomicUsize,
    grant_calls: AtomicUsize,
    process_calls: AtomicUsize,
    result_calls: AtomicUsize,
}

impl FakeProtectorClient {
    pub fn new(config: FakeProtectorConfig) -> Self {
        tracing::info!(
            ready_after_polls = config.ready_after_polls,
            fail_dispatch = config.fail_dispatch,
            "FakeProtectorClient initialized"
        );
        Self {
            fail_dispatch: AtomicBool::new(config.fail_dispatch),
            config,
            sequence: AtomicU64::new(1),
            polls: DashMap::new(),
            last_payload: Mutex::new(None),
            protect_calls: AtomicUsize::new(0),
            grant_calls: AtomicUsize::new(0),
            process_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeProtectorConfig::default())
    }

    /// 切换派发是否失败
    pub fn set_fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub fn protect_calls(&self) -> usize {
        self.protect_calls.load(Ordering::SeqCst)
    }

    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    /// 最近一次被保护的数据
    pub fn last_payload(&self) -> Option<ProtectedPayload> {
        self.last_payload.lock().ok().and_then(|p| p.clone())
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn next_hex(&self, width: usize) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("0x{:0width$x}", n, width = width)
    }
}

#[async_trait]
impl DataProtectorPort for FakeProtectorClient {
    async fn protect(&self, payload: &ProtectedPayload) -> Result<ProtectedData, ProtectorError> {
        self.protect_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.fail_protect {
            return Err(ProtectorError::Unavailable("fake protect failure".to_string()));
        }
        if let Ok(mut last) = self.last_payload.lock() {
            *last = Some(payload.clone());
        }

        let address = self.next_hex(40);
        tracing::debug!(name = %payload.name, address = %address, "FakeProtectorClient: protected");
        Ok(ProtectedData { address })
    }

    async fn grant_access(&self, request: &GrantRequest) -> Result<(), ProtectorError> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.fail_grant {
            return Err(ProtectorError::Rejected(format!(
                "fake grant failure for {}",
                request.authorized_user
            )));
        }
        Ok(())
    }

    async fn process_protected_data(
        &self,
        request: &ProcessRequest,
    ) -> Result<String, ProtectorError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_dispatch.load(Ordering::SeqCst) {
            return Err(ProtectorError::Unavailable(
                "no workerpool available".to_string(),
            ));
        }

        let task_id = self.next_hex(64);
        tracing::debug!(
            protected_data = %request.protected_data,
            task_id = %task_id,
            "FakeProtectorClient: dispatched"
        );
        Ok(task_id)
    }

    async fn get_result(&self, task_id: &str) -> Result<Value, ProtectorError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.fail_permanently {
            return Err(ProtectorError::Permanent(format!("task {} failed", task_id)));
        }

        let seen = {
            let mut count = self.polls.entry(task_id.to_string()).or_insert(0);
            let seen = *count;
            *count = count.saturating_add(1);
            seen
        };
        if seen < self.config.ready_after_polls {
            return Err(ProtectorError::NotReady(format!(
                "task {} not ready ({}/{})",
                task_id,
                seen + 1,
                self.config.ready_after_polls
            )));
        }

        Ok(self.config.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProcessRequest {
        ProcessRequest {
            protected_data: "0xdata".to_string(),
            app: "0xapp".to_string(),
            args: "process_passport".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ready_after_polls() {
        let client = FakeProtectorClient::new(FakeProtectorConfig {
            ready_after_polls: 2,
            ..Default::default()
        });
        let task_id = client.process_protected_data(&request()).await.unwrap();

        assert!(matches!(
            client.get_result(&task_id).await,
            Err(ProtectorError::NotReady(_))
        ));
        assert!(client.get_result(&task_id).await.is_err());
        let result = client.get_result(&task_id).await.unwrap();
        assert_eq!(result["passport_number"], "P1234567");
        assert_eq!(client.result_calls(), 3);
    }

    #[tokio::test]
    async fn test_ids_are_distinct() {
        let client = FakeProtectorClient::with_defaults();
        let a = client.process_protected_data(&request()).await.unwrap();
        let b = client.process_protected_data(&request()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 66);
    }

    #[tokio::test]
    async fn test_dispatch_toggle() {
        let client = FakeProtectorClient::new(FakeProtectorConfig {
            fail_dispatch: true,
            ..Default::default()
        });
        assert!(client.process_protected_data(&request()).await.is_err());

        client.set_fail_dispatch(false);
        assert!(client.process_protected_data(&request()).await.is_ok());
        assert_eq!(client.process_calls(), 2);
    }
}

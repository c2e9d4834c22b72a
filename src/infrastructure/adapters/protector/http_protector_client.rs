//! HTTP Protector Client - 调用外部机密计算网关
//!
//! 实现 DataProtectorPort trait，通过 HTTP 调用数据保护网关
//!
//! 网关 API:
//! POST {base}/api/protect  {"name": "...", "data": {..}}        -> {"address": "0x.."}
//! POST {base}/api/grant    {"protected_data", "authorized_app", "authorized_user"}
//! POST {base}/api/run      {"protected_data", "app", "args"}    -> {"task_id": "0x.."}
//! GET  {base}/api/tasks/{task_id}/result                        -> 结果 JSON
//!
//! 每个请求带 X-Account 与 X-Signature（对 path + body 签名）

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::{
    DataProtectorPort, GrantRequest, ProcessRequest, ProtectedData, ProtectorError, SignerPort,
};
use crate::domain::submission::ProtectedPayload;

#[derive(Debug, Serialize)]
struct ProtectHttpRequest<'a> {
    name: &'a str,
    data: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProtectHttpResponse {
    address: String,
}

#[derive(Debug, Serialize)]
struct GrantHttpRequest<'a> {
    protected_data: &'a str,
    authorized_app: &'a str,
    authorized_user: &'a str,
}

#[derive(Debug, Serialize)]
struct RunHttpRequest<'a> {
    protected_data: &'a str,
    app: &'a str,
    args: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunHttpResponse {
    task_id: String,
}

/// HTTP Protector 客户端配置
#[derive(Debug, Clone)]
pub struct HttpProtectorClientConfig {
    /// 网关基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpProtectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            timeout_secs: 60,
        }
    }
}

impl HttpProtectorClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP Protector 客户端
pub struct HttpProtectorClient {
    client: Client,
    config: HttpProtectorClientConfig,
    signer: Arc<dyn SignerPort>,
}

impl HttpProtectorClient {
    pub fn new(
        config: HttpProtectorClientConfig,
        signer: Arc<dyn SignerPort>,
    ) -> Result<Self, ProtectorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProtectorError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            signer,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 发送签名请求，非 2xx 按状态码分类
    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ProtectorError> {
        let account = self
            .signer
            .account()
            .ok_or_else(|| ProtectorError::Rejected("Session not connected".to_string()))?;

        let mut message = path.as_bytes().to_vec();
        if let Some(body) = &body {
            message.extend_from_slice(body);
        }
        let signature = self
            .signer
            .sign(&message)
            .await
            .map_err(|e| ProtectorError::Rejected(e.to_string()))?;

        let mut request = self
            .client
            .request(method, self.url(path))
            .header("X-Account", account)
            .header("X-Signature", signature);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProtectorError::Network(format!("Failed to read body: {}", e)))?
            .to_vec();

        if !status.is_success() || status == StatusCode::ACCEPTED {
            return Err(classify_status(status, &String::from_utf8_lossy(&bytes)));
        }
        Ok(bytes)
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<Vec<u8>, ProtectorError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| ProtectorError::InvalidResponse(format!("Failed to encode body: {}", e)))?;
        self.send_signed(Method::POST, path, Some(body)).await
    }
}

fn map_transport_error(e: reqwest::Error) -> ProtectorError {
    if e.is_timeout() {
        ProtectorError::Timeout
    } else if e.is_connect() {
        ProtectorError::Network(format!("Cannot connect to protector gateway: {}", e))
    } else {
        ProtectorError::Network(e.to_string())
    }
}

/// 按 HTTP 状态码分类错误
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ProtectorError {
    let detail = format!("HTTP {}: {}", status, body.trim());
    match status.as_u16() {
        202 | 404 | 425 => ProtectorError::NotReady(detail),
        429 => ProtectorError::Unavailable(detail),
        401 | 403 => ProtectorError::Rejected(detail),
        s if s >= 500 => ProtectorError::Unavailable(detail),
        _ => ProtectorError::Permanent(detail),
    }
}

/// 200 响应中显式的失败状态
pub(crate) fn check_result_body(body: Value) -> Result<Value, ProtectorError> {
    if !body.is_object() {
        return Err(ProtectorError::InvalidResponse(
            "Result is not a JSON object".to_string(),
        ));
    }
    if body.get("status").and_then(Value::as_str) == Some("failed") {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("task failed")
            .to_string();
        return Err(ProtectorError::Permanent(reason));
    }
    Ok(body)
}

fn parse<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtectorError> {
    serde_json::from_slice(bytes).map_err(|e| ProtectorError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl DataProtectorPort for HttpProtectorClient {
    async fn protect(&self, payload: &ProtectedPayload) -> Result<ProtectedData, ProtectorError> {
        tracing::debug!(
            url = %self.url("/api/protect"),
            name = %payload.name,
            field_count = payload.fields.len(),
            "Sending protect request"
        );

        let bytes = self
            .post_json(
                "/api/protect",
                &ProtectHttpRequest {
                    name: &payload.name,
                    data: &payload.fields,
                },
            )
            .await?;
        let response: ProtectHttpResponse = parse(&bytes)?;

        tracing::info!(address = %response.address, "Payload protected");
        Ok(ProtectedData {
            address: response.address,
        })
    }

    async fn grant_access(&self, request: &GrantRequest) -> Result<(), ProtectorError> {
        self.post_json(
            "/api/grant",
            &GrantHttpRequest {
                protected_data: &request.protected_data,
                authorized_app: &request.authorized_app,
                authorized_user: &request.authorized_user,
            },
        )
        .await?;
        Ok(())
    }

    async fn process_protected_data(
        &self,
        request: &ProcessRequest,
    ) -> Result<String, ProtectorError> {
        let bytes = self
            .post_json(
                "/api/run",
                &RunHttpRequest {
                    protected_data: &request.protected_data,
                    app: &request.app,
                    args: &request.args,
                },
            )
            .await?;
        let response: RunHttpResponse = parse(&bytes)?;

        tracing::info!(
            protected_data = %request.protected_data,
            remote_task_id = %response.task_id,
            "Processing job dispatched"
        );
        Ok(response.task_id)
    }

    async fn get_result(&self, task_id: &str) -> Result<Value, ProtectorError> {
        let path = format!("/api/tasks/{}/result", task_id);
        let bytes = self.send_signed(Method::GET, &path, None).await?;
        check_result_body(parse(&bytes)?)
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

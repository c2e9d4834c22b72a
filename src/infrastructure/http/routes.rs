//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping          GET   健康检查
//! - /api/session       GET   当前会话（账户、网络、是否可提交）
//! - /api/kyc/submit    POST  上传护照图片（multipart `file`，最多 3 个）
//! - /api/kyc/status    POST  查询任务状态
//! - /api/kyc/result    POST  等待任务结果（长轮询）
//! - /api/kyc/retry     POST  重新派发降级任务

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/session", get(handlers::get_session))
        .nest("/kyc", kyc_routes())
}

/// KYC 路由
fn kyc_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/submit", post(handlers::submit_kyc))
        .route("/status", post(handlers::task_status))
        .route("/result", post(handlers::task_result))
        .route("/retry", post(handlers::retry_dispatch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{PollOptions, SubmissionSettings};
    use crate::infrastructure::adapters::{
        FakeProtectorClient, FakeProtectorConfig, JpegCompressor, LocalSessionSigner,
    };
    use crate::infrastructure::http::server::build_router;
    use crate::infrastructure::memory::InMemoryTaskStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "kyc-test-boundary";

    fn app_with(protector: FakeProtectorConfig) -> (Router, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let settings = SubmissionSettings {
            required_chain_id: Some(134),
            ..Default::default()
        };
        let state = AppState::new(
            settings,
            PollOptions {
                timeout: Duration::from_secs(5),
                interval: Duration::from_millis(10),
            },
            Duration::from_secs(10),
            Arc::new(LocalSessionSigner::new(Some("0xowner".into()), 134, "secret")),
            Arc::new(FakeProtectorClient::new(protector)),
            Arc::new(JpegCompressor::new()),
            Arc::new(InMemoryTaskStore::new(tx)),
            CancellationToken::new(),
        );
        (build_router(Arc::new(state), 1024 * 1024), rx)
    }

    fn multipart(files: &[(&str, &str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, content_type, content) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/kyc/submit")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Value {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let (app, _rx) = app_with(FakeProtectorConfig::default());
        let request = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();

        let body = send(&app, request).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["protector"], true);
    }

    #[tokio::test]
    async fn test_session() {
        let (app, _rx) = app_with(FakeProtectorConfig::default());
        let request = Request::builder().uri("/api/session").body(Body::empty()).unwrap();

        let body = send(&app, request).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["account"], "0xowner");
        assert_eq!(body["data"]["ready"], true);
    }

    #[tokio::test]
    async fn test_submit_then_result() {
        let (app, _rx) = app_with(FakeProtectorConfig::default());

        let body = send(&app, multipart(&[("passport.jpg", "image/jpeg", b"jpeg-bytes")])).await;
        assert_eq!(body["errno"], 0, "{}", body);
        assert_eq!(body["data"]["status"], "submitted");
        assert_eq!(body["data"]["degraded"], false);
        let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

        let body = send(
            &app,
            json_request("/api/kyc/result", json!({"task_id": task_id, "timeout_secs": 2})),
        )
        .await;
        assert_eq!(body["errno"], 0, "{}", body);
        assert_eq!(body["data"]["verified"], true);
        assert_eq!(body["data"]["passport_number"], "P1234567");
        assert_eq!(body["data"]["wallet"], "0xowner");

        let body = send(&app, json_request("/api/kyc/status", json!({"task_id": task_id}))).await;
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["result"]["verified"], true);
    }

    #[tokio::test]
    async fn test_submit_rejects_unsupported_type() {
        let (app, _rx) = app_with(FakeProtectorConfig::default());

        let body = send(&app, multipart(&[("passport.pdf", "application/pdf", b"%PDF")])).await;
        assert_eq!(body["errno"], 400);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_submit_without_files() {
        let (app, _rx) = app_with(FakeProtectorConfig::default());

        let body = send(&app, multipart(&[])).await;
        assert_eq!(body["errno"], 400);
    }

    #[tokio::test]
    async fn test_degraded_submit_and_retry() {
        let (app, _rx) = app_with(FakeProtectorConfig {
            fail_dispatch: true,
            ..Default::default()
        });

        let body = send(&app, multipart(&[("passport.png", "image/png", b"png-bytes")])).await;
        assert_eq!(body["errno"], 0, "{}", body);
        assert_eq!(body["data"]["degraded"], true);
        assert!(body["data"]["manual_command"]
            .as_str()
            .unwrap()
            .contains("--protectedData"));
        let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

        let body = send(&app, json_request("/api/kyc/result", json!({"task_id": task_id}))).await;
        assert_eq!(body["errno"], 502);

        let body = send(
            &app,
            json_request(
                "/api/kyc/retry",
                json!({"task_id": task_id, "remote_task_id": "0xmanual"}),
            ),
        )
        .await;
        assert_eq!(body["errno"], 0, "{}", body);
        assert_eq!(body["data"]["remote_task_id"], "0xmanual");
        assert_eq!(body["data"]["degraded"], false);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let (app, _rx) = app_with(FakeProtectorConfig::default());

        let body = send(&app, json_request("/api/kyc/status", json!({"task_id": "nope"}))).await;
        assert_eq!(body["errno"], 404);

        let body = send(&app, json_request("/api/kyc/retry", json!({"task_id": "nope"}))).await;
        assert_eq!(body["errno"], 404);
    }
}

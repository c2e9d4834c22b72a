//! Tee-KYC - 护照 KYC 服务
//!
//! 启动顺序:
//! - 配置与日志
//! - Adapters: Signer, Protector, Compressor
//! - TaskStore + PollWorker
//! - HTTP Server（优雅关闭）

use std::sync::Arc;

use tee_kyc::application::ports::{DataProtectorPort, SignerPort};
use tee_kyc::config::{load_config, print_config, ProtectorMode};
use tee_kyc::infrastructure::adapters::{
    FakeProtectorClient, FakeProtectorConfig, HttpProtectorClient, HttpProtectorClientConfig,
    JpegCompressor, LocalSessionSigner,
};
use tee_kyc::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tee_kyc::infrastructure::memory::InMemoryTaskStore;
use tee_kyc::infrastructure::worker::{PollWorker, PollWorkerConfig, SHUTDOWN_GRACE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},tee_kyc={},tower_http=debug",
        config.log.level, config.log.level
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Tee-KYC - 护照 KYC 服务");
    print_config(&config);

    let shutdown = CancellationToken::new();

    // 会话签名
    let signer: Arc<dyn SignerPort> = Arc::new(LocalSessionSigner::new(
        config.session.account.clone(),
        config.session.chain_id,
        config.session.secret.clone(),
    ));

    // 数据保护服务
    let protector: Arc<dyn DataProtectorPort> = match config.protector.mode {
        ProtectorMode::Http => {
            let client_config = HttpProtectorClientConfig::new(&config.protector.url)
                .with_timeout(config.protector.timeout_secs);
            Arc::new(HttpProtectorClient::new(client_config, signer.clone())?)
        }
        ProtectorMode::Fake => {
            tracing::warn!("Using fake protector, results are simulated");
            Arc::new(FakeProtectorClient::new(FakeProtectorConfig {
                ready_after_polls: config.protector.fake_ready_after_polls,
                ..Default::default()
            }))
        }
    };

    let compressor = Arc::new(JpegCompressor::new());

    // 创建轮询队列与任务存储
    let (task_tx, task_rx) = mpsc::channel(config.poll.queue_capacity);
    let task_store = Arc::new(InMemoryTaskStore::new(task_tx));

    let state = Arc::new(AppState::new(
        config.submission_settings(),
        config.poll.options(),
        config.poll.max_timeout(),
        signer,
        protector,
        compressor,
        task_store,
        shutdown.clone(),
    ));

    // 启动 PollWorker
    let worker_config = PollWorkerConfig {
        max_concurrent: config.poll.max_concurrent,
        options: config.poll.options(),
        sweep_interval: config.poll.sweep_interval(),
    };
    let worker = PollWorker::new(worker_config, task_rx, state.poller.clone(), shutdown.clone());
    let worker_handle = tokio::spawn(worker.run());

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port)
        .with_body_limit(config.upload.body_limit_bytes());
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    let signal_token = shutdown.clone();
    server
        .run_with_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
            signal_token.cancel();
        })
        .await?;

    // 停止进行中的轮询
    shutdown.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, worker_handle).await.is_err() {
        tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "PollWorker did not stop in time");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

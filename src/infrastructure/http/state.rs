//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::{
    // Command handlers
    RetryDispatchHandler, SubmissionSettings, SubmitBatchHandler,
    // Query handlers
    GetSessionHandler, GetTaskHandler, PollOptions, PollResultHandler, TaskPoller,
    // Ports
    DataProtectorPort, ImageCompressorPort, SignerPort, TaskStorePort,
};

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub task_store: Arc<dyn TaskStorePort>,
    pub protector: Arc<dyn DataProtectorPort>,
    pub poller: Arc<TaskPoller>,

    // ========== Command Handlers ==========
    pub submit_handler: SubmitBatchHandler,
    pub retry_handler: RetryDispatchHandler,

    // ========== Query Handlers ==========
    pub get_task_handler: GetTaskHandler,
    pub poll_result_handler: PollResultHandler,
    pub session_handler: GetSessionHandler,
}

impl AppState {
    /// 创建应用状态
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: SubmissionSettings,
        poll_defaults: PollOptions,
        max_poll_timeout: Duration,
        signer: Arc<dyn SignerPort>,
        protector: Arc<dyn DataProtectorPort>,
        compressor: Arc<dyn ImageCompressorPort>,
        task_store: Arc<dyn TaskStorePort>,
        shutdown: CancellationToken,
    ) -> Self {
        let poller = Arc::new(TaskPoller::new(task_store.clone(), protector.clone()));

        Self {
            // Ports
            task_store: task_store.clone(),
            protector: protector.clone(),
            poller: poller.clone(),

            // Command handlers
            submit_handler: SubmitBatchHandler::new(
                settings.clone(),
                signer.clone(),
                protector.clone(),
                compressor,
                task_store.clone(),
            ),
            retry_handler: RetryDispatchHandler::new(
                settings.clone(),
                signer.clone(),
                protector,
                task_store.clone(),
            ),

            // Query handlers
            get_task_handler: GetTaskHandler::new(task_store, settings.target.clone()),
            poll_result_handler: PollResultHandler::new(
                poller,
                poll_defaults,
                max_poll_timeout,
                shutdown,
            ),
            session_handler: GetSessionHandler::new(signer, settings.required_chain_id),
        }
    }
}

//! Submission Command Handlers

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::application::commands::submission_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    DataProtectorPort, ImageCompressorPort, SignerPort, TaskStorePort,
};
use crate::domain::submission::{ArtifactError, SubmissionBatch};
use crate::domain::task::Task;

/// 检查会话已连接且网络正确，返回当前账户
pub(crate) fn require_session(
    signer: &dyn SignerPort,
    required_chain_id: Option<u64>,
) -> Result<String, ApplicationError> {
    let account = signer
        .account()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApplicationError::protection("Session not connected"))?;

    if let Some(required) = required_chain_id {
        let actual = signer.chain_id();
        if actual != required {
            return Err(ApplicationError::protection(format!(
                "Wrong network: connected to chain {}, required chain {}",
                actual, required
            )));
        }
    }

    Ok(account)
}

/// SubmitBatch Handler - 提交协调器
///
/// 校验 -> 压缩 -> 打包 -> 保护 -> 授权 -> 派发
pub struct SubmitBatchHandler {
    settings: SubmissionSettings,
    signer: Arc<dyn SignerPort>,
    protector: Arc<dyn DataProtectorPort>,
    compressor: Arc<dyn ImageCompressorPort>,
    task_store: Arc<dyn TaskStorePort>,
}

impl SubmitBatchHandler {
    pub fn new(
        settings: SubmissionSettings,
        signer: Arc<dyn SignerPort>,
        protector: Arc<dyn DataProtectorPort>,
        compressor: Arc<dyn ImageCompressorPort>,
        task_store: Arc<dyn TaskStorePort>,
    ) -> Self {
        Self {
            settings,
            signer,
            protector,
            compressor,
            task_store,
        }
    }

    pub async fn handle(&self, cmd: SubmitBatchCommand) -> Result<Task, ApplicationError> {
        // 任何网络调用之前完成校验
        let mut batch = SubmissionBatch::new(cmd.artifacts, &self.settings.limits)?;
        let owner = require_session(self.signer.as_ref(), self.settings.required_chain_id)?;

        self.compress_oversized(&mut batch).await?;

        let payload = batch.into_payload(Utc::now());
        tracing::info!(
            name = %payload.name,
            field_count = payload.fields.len(),
            approx_size = payload.approx_size(),
            "Protecting payload"
        );

        let protected = self.protector.protect(&payload).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to protect payload");
            ApplicationError::protection(e.to_string())
        })?;

        let mut task = Task::new(owner, protected.address);
        let target = &self.settings.target;
        let manual_command = task.manual_command(&target.cli_program, &target.app_address);

        if let Some(grant) = target.grant_request(task.protected_address()) {
            match self.protector.grant_access(&grant).await {
                Ok(()) => tracing::info!(
                    protected_data = %grant.protected_data,
                    authorized_user = %grant.authorized_user,
                    "Access granted"
                ),
                Err(e) => tracing::warn!(
                    protected_data = %grant.protected_data,
                    error = %e,
                    manual_command = %manual_command,
                    "Failed to grant access"
                ),
            }
        }

        let request = target.process_request(task.protected_address());
        match self.protector.process_protected_data(&request).await {
            Ok(remote_task_id) => {
                task.mark_dispatched(remote_task_id)
                    .map_err(|e| ApplicationError::internal(e.to_string()))?;
                tracing::info!(
                    task_id = %task.id(),
                    remote_task_id = ?task.remote_task_id(),
                    "Task dispatched"
                );
            }
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id(),
                    protected_data = %task.protected_address(),
                    error = %e,
                    manual_command = %manual_command,
                    "Dispatch failed, task left for retry"
                );
                task.mark_dispatch_failed(e.to_string())
                    .map_err(|e| ApplicationError::internal(e.to_string()))?;
            }
        }

        self.task_store.submit(task.clone())?;
        Ok(task)
    }

    /// 超过上限的文件重新编码
    async fn compress_oversized(&self, batch: &mut SubmissionBatch) -> Result<(), ApplicationError> {
        let budget = &self.settings.budget;

        for index in 0..batch.len() {
            let artifact = &batch.artifacts()[index];
            if artifact.size() <= budget.ceiling_bytes {
                continue;
            }

            tracing::debug!(
                name = %artifact.name(),
                size = artifact.size(),
                ceiling = budget.ceiling_bytes,
                "Compressing oversized artifact"
            );

            let compressed = self.compressor.compress(artifact, budget).await?;
            if compressed.size() > budget.ceiling_bytes {
                return Err(ArtifactError::Incompressible {
                    name: artifact.name().to_string(),
                    ceiling: budget.ceiling_bytes,
                }
                .into());
            }

            tracing::info!(
                name = %compressed.name(),
                original_size = artifact.size(),
                compressed_size = compressed.size(),
                "Artifact compressed"
            );
            batch.replace(index, compressed);
        }

        Ok(())
    }
}

/// RetryDispatch Handler - 凭受保护数据地址重新派发
///
/// 同一任务的重试串行执行：后到的请求等待前一次完成，
/// 然后直接拿到已派发的任务，不会再启动第二个远程任务
pub struct RetryDispatchHandler {
    settings: SubmissionSettings,
    signer: Arc<dyn SignerPort>,
    protector: Arc<dyn DataProtectorPort>,
    task_store: Arc<dyn TaskStorePort>,
    /// task_id -> 派发锁（仅在有重试进行时存在）
    dispatch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RetryDispatchHandler {
    pub fn new(
        settings: SubmissionSettings,
        signer: Arc<dyn SignerPort>,
        protector: Arc<dyn DataProtectorPort>,
        task_store: Arc<dyn TaskStorePort>,
    ) -> Self {
        Self {
            settings,
            signer,
            protector,
            task_store,
            dispatch_locks: DashMap::new(),
        }
    }

    pub async fn handle(&self, cmd: RetryDispatchCommand) -> Result<Task, ApplicationError> {
        let task_id = cmd.task_id.clone();
        let lock = self.dispatch_locks.entry(task_id.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            self.dispatch_exclusive(cmd).await
        };

        drop(lock);
        self.dispatch_locks
            .remove_if(&task_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// 持有任务派发锁时执行；任务状态在加锁之后读取
    async fn dispatch_exclusive(&self, cmd: RetryDispatchCommand) -> Result<Task, ApplicationError> {
        let task = self
            .task_store
            .get(&cmd.task_id)
            .ok_or_else(|| ApplicationError::not_found("Task", &cmd.task_id))?;

        if task.is_terminal() {
            return Err(ApplicationError::invalid_state(format!(
                "Task {} is already {}",
                task.id(),
                task.status()
            )));
        }
        if !task.is_degraded() {
            return Ok(task);
        }

        if let Some(remote_task_id) = cmd.remote_task_id.filter(|id| !id.is_empty()) {
            tracing::info!(
                task_id = %task.id(),
                remote_task_id = %remote_task_id,
                "Attaching manually dispatched job"
            );
            return Ok(self.task_store.attach_remote(task.id(), &remote_task_id)?);
        }

        require_session(self.signer.as_ref(), self.settings.required_chain_id)?;

        let request = self.settings.target.process_request(task.protected_address());
        match self.protector.process_protected_data(&request).await {
            Ok(remote_task_id) => {
                tracing::info!(
                    task_id = %task.id(),
                    remote_task_id = %remote_task_id,
                    "Dispatch retry succeeded"
                );
                Ok(self.task_store.attach_remote(task.id(), &remote_task_id)?)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(task_id = %task.id(), error = %reason, "Dispatch retry failed");
                self.task_store.record_dispatch_error(task.id(), &reason)?;
                Err(ApplicationError::SubmissionDegraded {
                    task_id: task.id().to_string(),
                    protected_address: task.protected_address().to_string(),
                    reason,
                })
            }
        }
    }
}

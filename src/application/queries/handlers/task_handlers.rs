//! Task Query Handlers

use std::sync::Arc;

use serde::Serialize;

use crate::application::commands::DispatchTarget;
use crate::application::error::ApplicationError;
use crate::application::ports::{SignerPort, TaskStorePort};
use crate::application::queries::{GetSessionQuery, GetTaskQuery};
use crate::domain::task::{ResultRecord, Task, TaskStatus};

// ============================================================================
// Response DTOs
// ============================================================================

/// 任务视图
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: String,
    pub owner: String,
    pub protected_address: String,
    pub remote_task_id: Option<String>,
    pub status: TaskStatus,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<String>,
    /// 降级任务的手动派发命令
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultRecord>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskView {
    pub fn new(task: &Task, result: Option<ResultRecord>, target: &DispatchTarget) -> Self {
        let manual_command = task
            .is_degraded()
            .then(|| task.manual_command(&target.cli_program, &target.app_address));

        Self {
            task_id: task.id().to_string(),
            owner: task.owner().to_string(),
            protected_address: task.protected_address().to_string(),
            remote_task_id: task.remote_task_id().map(String::from),
            status: task.status(),
            degraded: task.is_degraded(),
            dispatch_error: task.dispatch_error().map(String::from),
            manual_command,
            failure_reason: task.failure_reason().map(String::from),
            result,
            created_at: task.created_at().to_rfc3339(),
            updated_at: task.updated_at().to_rfc3339(),
        }
    }
}

/// 会话信息
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub account: Option<String>,
    pub chain_id: u64,
    pub required_chain_id: Option<u64>,
    /// 账户已连接且网络正确
    pub ready: bool,
}

// ============================================================================
// GetTask Query
// ============================================================================

/// GetTask Handler
pub struct GetTaskHandler {
    task_store: Arc<dyn TaskStorePort>,
    target: DispatchTarget,
}

impl GetTaskHandler {
    pub fn new(task_store: Arc<dyn TaskStorePort>, target: DispatchTarget) -> Self {
        Self { task_store, target }
    }

    pub fn handle(&self, query: GetTaskQuery) -> Result<TaskView, ApplicationError> {
        let task = self
            .task_store
            .get(&query.task_id)
            .ok_or_else(|| ApplicationError::not_found("Task", &query.task_id))?;
        let result = self.task_store.get_result(task.id());

        Ok(TaskView::new(&task, result, &self.target))
    }
}

// ============================================================================
// GetSession Query
// ============================================================================

/// GetSession Handler
pub struct GetSessionHandler {
    signer: Arc<dyn SignerPort>,
    required_chain_id: Option<u64>,
}

impl GetSessionHandler {
    pub fn new(signer: Arc<dyn SignerPort>, required_chain_id: Option<u64>) -> Self {
        Self {
            signer,
            required_chain_id,
        }
    }

    pub fn handle(&self, _query: GetSessionQuery) -> SessionInfo {
        let account = self.signer.account().filter(|a| !a.is_empty());
        let chain_id = self.signer.chain_id();
        let ready = account.is_some() && self.required_chain_id.map_or(true, |id| id == chain_id);

        SessionInfo {
            account,
            chain_id,
            required_chain_id: self.required_chain_id,
            ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::LocalSessionSigner;
    use crate::infrastructure::memory::InMemoryTaskStore;
    use tokio::sync::mpsc;

    #[test]
    fn test_degraded_view_has_manual_command() {
        let mut task = Task::new("0xabc", "0xdata");
        task.mark_dispatch_failed("workerpool offline").unwrap();

        let view = TaskView::new(&task, None, &DispatchTarget::default());
        assert!(view.degraded);
        assert_eq!(
            view.manual_command.as_deref(),
            Some("iapp run 0x77E4126768A17585170f0Fe190f052327070babE --protectedData 0xdata")
        );
    }

    #[test]
    fn test_dispatched_view_has_no_manual_command() {
        let mut task = Task::new("0xabc", "0xdata");
        task.mark_dispatched("0xtask").unwrap();

        let view = TaskView::new(&task, None, &DispatchTarget::default());
        assert!(!view.degraded);
        assert!(view.manual_command.is_none());
        assert_eq!(view.remote_task_id.as_deref(), Some("0xtask"));
    }

    #[test]
    fn test_get_task_not_found() {
        let (tx, _rx) = mpsc::channel(1);
        let handler = GetTaskHandler::new(Arc::new(InMemoryTaskStore::new(tx)), DispatchTarget::default());

        let result = handler.handle(GetTaskQuery {
            task_id: "nope".to_string(),
        });
        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
    }

    #[test]
    fn test_session_readiness() {
        let connected = Arc::new(LocalSessionSigner::new(Some("0xabc".into()), 134, "s"));
        assert!(GetSessionHandler::new(connected.clone(), Some(134)).handle(GetSessionQuery).ready);
        assert!(!GetSessionHandler::new(connected, Some(1)).handle(GetSessionQuery).ready);

        let disconnected = Arc::new(LocalSessionSigner::new(None, 134, "s"));
        let info = GetSessionHandler::new(disconnected, None).handle(GetSessionQuery);
        assert!(!info.ready);
        assert!(info.account.is_none());
    }
}

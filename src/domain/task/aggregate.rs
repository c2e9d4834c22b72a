//! Task Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TaskError, TaskStatus};

/// 远程处理任务
///
/// 不变量:
/// - 只在数据保护成功后创建，protected_address 总是存在
/// - completed / failed 之后状态不可再变
/// - submitted 且没有 remote_task_id 即为降级状态，可凭 protected_address 重试派发
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: String,
    owner: String,
    protected_address: String,
    remote_task_id: Option<String>,
    status: TaskStatus,
    dispatch_error: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(owner: impl Into<String>, protected_address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            protected_address: protected_address.into(),
            remote_task_id: None,
            status: TaskStatus::Pending,
            dispatch_error: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 派发成功，记录远程任务 ID
    pub fn mark_dispatched(&mut self, remote_task_id: impl Into<String>) -> Result<(), TaskError> {
        if self.remote_task_id.is_some() {
            return Err(TaskError::AlreadyDispatched(self.id.clone()));
        }
        if self.status == TaskStatus::Pending {
            self.transition(TaskStatus::Submitted)?;
        } else if self.status != TaskStatus::Submitted {
            return Err(self.invalid(TaskStatus::Submitted));
        }
        self.remote_task_id = Some(remote_task_id.into());
        self.dispatch_error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 派发失败：保持 submitted，无远程任务 ID
    pub fn mark_dispatch_failed(&mut self, reason: impl Into<String>) -> Result<(), TaskError> {
        if self.remote_task_id.is_some() {
            return Err(TaskError::AlreadyDispatched(self.id.clone()));
        }
        if self.status == TaskStatus::Pending {
            self.transition(TaskStatus::Submitted)?;
        } else if self.status != TaskStatus::Submitted {
            return Err(self.invalid(TaskStatus::Submitted));
        }
        self.dispatch_error = Some(reason.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid(next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// 手动派发命令，供运维在程序派发失败时使用
    pub fn manual_command(&self, cli_program: &str, app_address: &str) -> String {
        format!(
            "{} run {} --protectedData {}",
            cli_program, app_address, self.protected_address
        )
    }

    fn invalid(&self, to: TaskStatus) -> TaskError {
        TaskError::InvalidTransition {
            task_id: self.id.clone(),
            from: self.status,
            to,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn protected_address(&self) -> &str {
        &self.protected_address
    }

    pub fn remote_task_id(&self) -> Option<&str> {
        self.remote_task_id.as_deref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn dispatch_error(&self) -> Option<&str> {
        self.dispatch_error.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn is_degraded(&self) -> bool {
        self.status == TaskStatus::Submitted && self.remote_task_id.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_lifecycle() {
        let mut task = Task::new("0xabc", "0xdata");
        assert_eq!(task.status(), TaskStatus::Pending);

        task.mark_dispatched("0xtask").unwrap();
        assert_eq!(task.status(), TaskStatus::Submitted);
        assert_eq!(task.remote_task_id(), Some("0xtask"));
        assert!(!task.is_degraded());

        task.transition(TaskStatus::Processing).unwrap();
        task.transition(TaskStatus::Completed).unwrap();
        assert!(task.is_terminal());
        assert!(task.fail("late").is_err());
    }

    #[test]
    fn test_degraded_then_retried() {
        let mut task = Task::new("0xabc", "0xdata");
        task.mark_dispatch_failed("no workerpool").unwrap();
        assert_eq!(task.status(), TaskStatus::Submitted);
        assert!(task.is_degraded());
        assert_eq!(task.dispatch_error(), Some("no workerpool"));

        task.mark_dispatched("0xtask").unwrap();
        assert!(!task.is_degraded());
        assert_eq!(task.dispatch_error(), None);
    }

    #[test]
    fn test_double_dispatch_rejected() {
        let mut task = Task::new("0xabc", "0xdata");
        task.mark_dispatched("0x1").unwrap();
        assert_eq!(
            task.mark_dispatched("0x2"),
            Err(TaskError::AlreadyDispatched(task.id().to_string()))
        );
    }

    #[test]
    fn test_fail_records_reason() {
        let mut task = Task::new("0xabc", "0xdata");
        task.mark_dispatched("0x1").unwrap();
        task.fail("enclave crashed").unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.failure_reason(), Some("enclave crashed"));
    }

    #[test]
    fn test_manual_command() {
        let task = Task::new("0xabc", "0xdata");
        assert_eq!(
            task.manual_command("iapp", "0xapp"),
            "iapp run 0xapp --protectedData 0xdata"
        );
    }
}

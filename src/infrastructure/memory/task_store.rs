//! In-Memory Task Store Implementation

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::application::ports::{StoreError, TaskStorePort};
use crate::domain::task::{ResultRecord, Task, TaskStatus};

/// 内存任务存储
pub struct InMemoryTaskStore {
    /// task_id -> Task
    tasks: DashMap<String, Task>,
    /// task_id -> ResultRecord（只在 completed 时写入一次）
    results: DashMap<String, ResultRecord>,
    /// 轮询队列发送端
    queue_sender: mpsc::Sender<String>,
}

impl InMemoryTaskStore {
    pub fn new(queue_sender: mpsc::Sender<String>) -> Self {
        Self {
            tasks: DashMap::new(),
            results: DashMap::new(),
            queue_sender,
        }
    }

    fn enqueue(&self, task_id: &str) {
        if let Err(e) = self.queue_sender.try_send(task_id.to_string()) {
            tracing::warn!(task_id = %task_id, error = %e, "Task not queued, left for the worker sweep");
        }
    }
}

impl TaskStorePort for InMemoryTaskStore {
    fn submit(&self, task: Task) -> Result<(), StoreError> {
        let task_id = task.id().to_string();
        let dispatched = task.remote_task_id().is_some();

        match self.tasks.entry(task_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::AlreadyExists(task_id))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(task);
            }
        }

        if dispatched {
            self.enqueue(&task_id);
        }

        tracing::debug!(task_id = %task_id, dispatched, "Task stored");
        Ok(())
    }

    fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    fn attach_remote(&self, task_id: &str, remote_task_id: &str) -> Result<Task, StoreError> {
        let snapshot = {
            let mut task = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
            task.mark_dispatched(remote_task_id)?;
            task.clone()
        };

        self.enqueue(task_id);
        tracing::debug!(task_id = %task_id, remote_task_id = %remote_task_id, "Remote task attached");
        Ok(snapshot)
    }

    fn record_dispatch_error(&self, task_id: &str, reason: &str) -> Result<Task, StoreError> {
        let mut task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.mark_dispatch_failed(reason)?;
        Ok(task.clone())
    }

    fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let mut task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

        let old_status = task.status();
        task.transition(status)?;

        if old_status != status {
            tracing::debug!(
                task_id = %task_id,
                old_status = %old_status,
                new_status = %status,
                "Task status changed"
            );
        }
        Ok(())
    }

    fn complete(&self, task_id: &str, mut record: ResultRecord) -> Result<ResultRecord, StoreError> {
        let mut task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

        if task.status() == TaskStatus::Completed {
            if let Some(existing) = self.results.get(task_id) {
                tracing::debug!(task_id = %task_id, "Task already completed, keeping first result");
                return Ok(existing.clone());
            }
        }

        task.transition(TaskStatus::Completed)?;
        // 结果按任务 ID 记录
        record.task_id = task_id.to_string();
        self.results.insert(task_id.to_string(), record.clone());
        Ok(record)
    }

    fn fail(&self, task_id: &str, reason: &str) -> Result<(), StoreError> {
        let mut task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.fail(reason)?;
        Ok(())
    }

    fn get_result(&self, task_id: &str) -> Option<ResultRecord> {
        self.results.get(task_id).map(|r| r.clone())
    }

    fn list_all(&self) -> Vec<String> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(task_id: &str, passport: &str) -> ResultRecord {
        let mut fields = BTreeMap::new();
        fields.insert("passport_number".to_string(), passport.to_string());
        ResultRecord {
            task_id: task_id.to_string(),
            fields,
            verified: true,
            completed_at: Utc::now(),
        }
    }

    fn dispatched_task() -> Task {
        let mut task = Task::new("0xowner", "0xdata");
        task.mark_dispatched("0xremote").unwrap();
        task
    }

    #[tokio::test]
    async fn test_dispatched_task_is_enqueued() {
        let (tx, mut rx) = mpsc::channel(10);
        let store = InMemoryTaskStore::new(tx);

        let task = dispatched_task();
        let task_id = task.id().to_string();
        store.submit(task.clone()).unwrap();

        assert_eq!(rx.try_recv().unwrap(), task_id);
        assert!(matches!(store.submit(task), Err(StoreError::AlreadyExists(_))));
        assert_eq!(store.list_all(), vec![task_id]);
    }

    #[tokio::test]
    async fn test_degraded_task_not_enqueued_until_attached() {
        let (tx, mut rx) = mpsc::channel(10);
        let store = InMemoryTaskStore::new(tx);

        let mut task = Task::new("0xowner", "0xdata");
        task.mark_dispatch_failed("offline").unwrap();
        let task_id = task.id().to_string();
        store.submit(task).unwrap();
        assert!(rx.try_recv().is_err());

        let updated = store.record_dispatch_error(&task_id, "still offline").unwrap();
        assert_eq!(updated.dispatch_error(), Some("still offline"));

        let attached = store.attach_remote(&task_id, "0xremote").unwrap();
        assert_eq!(attached.remote_task_id(), Some("0xremote"));
        assert_eq!(rx.try_recv().unwrap(), task_id);
    }

    #[tokio::test]
    async fn test_first_completion_wins() {
        let (tx, _rx) = mpsc::channel(10);
        let store = InMemoryTaskStore::new(tx);
        let task = dispatched_task();
        let task_id = task.id().to_string();
        store.submit(task).unwrap();

        store.set_status(&task_id, TaskStatus::Processing).unwrap();
        store.set_status(&task_id, TaskStatus::Processing).unwrap();

        let first = store.complete(&task_id, record(&task_id, "A1")).unwrap();
        let second = store.complete(&task_id, record(&task_id, "B2")).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.get_result(&task_id).unwrap().field("passport_number"), Some("A1"));
    }

    #[tokio::test]
    async fn test_result_keyed_by_task_id() {
        let (tx, _rx) = mpsc::channel(10);
        let store = InMemoryTaskStore::new(tx);
        let task = dispatched_task();
        let task_id = task.id().to_string();
        store.submit(task).unwrap();

        let stored = store.complete(&task_id, record("other", "A1")).unwrap();
        assert_eq!(stored.task_id, task_id);
        assert!(store.get_result("other").is_none());
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let (tx, _rx) = mpsc::channel(10);
        let store = InMemoryTaskStore::new(tx);
        let task = dispatched_task();
        let task_id = task.id().to_string();
        store.submit(task).unwrap();

        store.fail(&task_id, "enclave crashed").unwrap();
        assert!(matches!(
            store.complete(&task_id, record(&task_id, "A1")),
            Err(StoreError::Transition(_))
        ));
        assert!(store.set_status(&task_id, TaskStatus::Processing).is_err());
        assert_eq!(store.get(&task_id).unwrap().failure_reason(), Some("enclave crashed"));
    }

    #[test]
    fn test_unknown_task() {
        let (tx, _rx) = mpsc::channel(1);
        let store = InMemoryTaskStore::new(tx);
        assert!(matches!(
            store.set_status("missing", TaskStatus::Processing),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get("missing").is_none());
    }
}

//! Poll Handlers - 任务轮询
//!
//! 单个任务由一个顺序循环轮询；不同任务可并发

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{DataProtectorPort, TaskStorePort};
use crate::application::queries::PollResultQuery;
use crate::domain::task::{normalize, ResultRecord, TaskStatus};

/// 轮询参数
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// 总等待上限
    pub timeout: Duration,
    /// 两次查询之间的间隔
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(2),
        }
    }
}

/// Task Poller
///
/// 查询远程结果直到终态、超时或取消；终态结果经 TaskStore 只记录一次
pub struct TaskPoller {
    task_store: Arc<dyn TaskStorePort>,
    protector: Arc<dyn DataProtectorPort>,
}

impl TaskPoller {
    pub fn new(task_store: Arc<dyn TaskStorePort>, protector: Arc<dyn DataProtectorPort>) -> Self {
        Self {
            task_store,
            protector,
        }
    }

    pub async fn poll_until_done(
        &self,
        task_id: &str,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> Result<ResultRecord, ApplicationError> {
        let task = self
            .task_store
            .get(task_id)
            .ok_or_else(|| ApplicationError::not_found("Task", task_id))?;

        if let Some(outcome) = self.settled(task_id) {
            return outcome;
        }

        let remote_task_id = match task.remote_task_id() {
            Some(id) => id.to_string(),
            None => {
                return Err(ApplicationError::SubmissionDegraded {
                    task_id: task_id.to_string(),
                    protected_address: task.protected_address().to_string(),
                    reason: task
                        .dispatch_error()
                        .unwrap_or("Task was never dispatched")
                        .to_string(),
                })
            }
        };

        let started = Instant::now();
        // 超出时钟范围的 timeout 视为不设上限
        let deadline = started.checked_add(options.timeout);
        let remaining = || {
            deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()))
        };
        let timed_out = || ApplicationError::PollTimeout {
            task_id: task_id.to_string(),
            waited_ms: started.elapsed().as_millis() as u64,
        };
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ApplicationError::Cancelled(task_id.to_string()));
            }
            // 其他轮询者可能已记录终态
            if let Some(outcome) = self.settled(task_id) {
                return outcome;
            }

            let left = remaining();
            if left.is_zero() {
                return Err(timed_out());
            }

            attempt += 1;
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(task_id = %task_id, attempt, "Polling cancelled");
                    return Err(ApplicationError::Cancelled(task_id.to_string()));
                }
                r = tokio::time::timeout(left, self.protector.get_result(&remote_task_id)) => r,
            };

            let response = match response {
                Ok(r) => r,
                Err(_) => {
                    tracing::warn!(task_id = %task_id, attempt, "Polling deadline reached during request");
                    return Err(timed_out());
                }
            };

            match response {
                Ok(raw) => {
                    let raw = fill_wallet(raw, task.owner());
                    let record = normalize(task_id, &raw);
                    let stored = self.task_store.complete(task_id, record)?;
                    tracing::info!(
                        task_id = %task_id,
                        remote_task_id = %remote_task_id,
                        attempt,
                        verified = stored.verified,
                        "Task completed"
                    );
                    return Ok(stored);
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(task_id = %task_id, attempt, error = %e, "Result not ready");
                    if let Err(e) = self.task_store.set_status(task_id, TaskStatus::Processing) {
                        tracing::debug!(task_id = %task_id, error = %e, "Status not updated");
                    }
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::error!(task_id = %task_id, attempt, error = %reason, "Task failed");
                    if let Err(store_err) = self.task_store.fail(task_id, &reason) {
                        if let Some(outcome) = self.settled(task_id) {
                            return outcome;
                        }
                        return Err(store_err.into());
                    }
                    return Err(ApplicationError::PollFailed {
                        task_id: task_id.to_string(),
                        reason,
                    });
                }
            }

            let left = remaining();
            if left.is_zero() {
                return Err(timed_out());
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(task_id = %task_id, attempt, "Polling cancelled");
                    return Err(ApplicationError::Cancelled(task_id.to_string()));
                }
                _ = tokio::time::sleep(options.interval.min(left)) => {}
            }
        }
    }

    /// 已派发且尚未终态的任务
    pub fn outstanding_tasks(&self) -> Vec<String> {
        self.task_store
            .list_all()
            .into_iter()
            .filter(|id| {
                self.task_store
                    .get(id)
                    .is_some_and(|t| t.remote_task_id().is_some() && !t.is_terminal())
            })
            .collect()
    }

    /// 已处于终态的任务直接返回记录的结果
    fn settled(&self, task_id: &str) -> Option<Result<ResultRecord, ApplicationError>> {
        let task = self.task_store.get(task_id)?;
        match task.status() {
            TaskStatus::Completed => Some(self.task_store.get_result(task_id).ok_or_else(|| {
                ApplicationError::internal(format!("Task {} completed without a result", task_id))
            })),
            TaskStatus::Failed => Some(Err(ApplicationError::PollFailed {
                task_id: task_id.to_string(),
                reason: task.failure_reason().unwrap_or("unknown").to_string(),
            })),
            _ => None,
        }
    }
}

/// 结果缺少 wallet 时用任务所有者补全
fn fill_wallet(mut raw: Value, owner: &str) -> Value {
    if let Some(obj) = raw.as_object_mut() {
        if !obj.contains_key("fields") && !obj.contains_key("wallet") {
            obj.insert("wallet".to_string(), Value::String(owner.to_string()));
        }
    }
    raw
}

/// PollResult Handler - 长轮询入口
pub struct PollResultHandler {
    poller: Arc<TaskPoller>,
    defaults: PollOptions,
    max_timeout: Duration,
    shutdown: CancellationToken,
}

impl PollResultHandler {
    pub fn new(
        poller: Arc<TaskPoller>,
        defaults: PollOptions,
        max_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            poller,
            defaults,
            max_timeout,
            shutdown,
        }
    }

    pub async fn handle(&self, query: PollResultQuery) -> Result<ResultRecord, ApplicationError> {
        let options = PollOptions {
            timeout: query.timeout.unwrap_or(self.defaults.timeout).min(self.max_timeout),
            interval: self.defaults.interval,
        };
        let cancel = self.shutdown.child_token();

        self.poller
            .poll_until_done(&query.task_id, &options, &cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::Task;
    use crate::infrastructure::adapters::{FakeProtectorClient, FakeProtectorConfig};
    use crate::infrastructure::memory::InMemoryTaskStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        protector: Arc<FakeProtectorClient>,
        poller: TaskPoller,
        _queue: mpsc::Receiver<String>,
    }

    fn fixture(config: FakeProtectorConfig) -> Fixture {
        let (tx, rx) = mpsc::channel(16);
        let store = Arc::new(InMemoryTaskStore::new(tx));
        let protector = Arc::new(FakeProtectorClient::new(config));
        let poller = TaskPoller::new(store.clone(), protector.clone());
        Fixture {
            store,
            protector,
            poller,
            _queue: rx,
        }
    }

    fn dispatched(store: &InMemoryTaskStore) -> String {
        let mut task = Task::new("0xowner", "0xdata");
        task.mark_dispatched("0xremote").unwrap();
        let id = task.id().to_string();
        store.submit(task).unwrap();
        id
    }

    fn options(timeout_secs: u64, interval_secs: u64) -> PollOptions {
        PollOptions {
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_not_ready_polls() {
        let f = fixture(FakeProtectorConfig {
            ready_after_polls: 2,
            ..Default::default()
        });
        let id = dispatched(&f.store);

        let record = f
            .poller
            .poll_until_done(&id, &options(60, 2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(record.task_id, id);
        assert!(record.verified);
        assert_eq!(record.field("wallet"), Some("0xowner"));
        assert_eq!(f.protector.result_calls(), 3);
        assert_eq!(f.store.get(&id).unwrap().status(), TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_task_is_idempotent() {
        let f = fixture(FakeProtectorConfig::default());
        let id = dispatched(&f.store);
        let cancel = CancellationToken::new();

        let first = f.poller.poll_until_done(&id, &options(60, 2), &cancel).await.unwrap();
        let calls = f.protector.result_calls();
        let second = f.poller.poll_until_done(&id, &options(60, 2), &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.protector.result_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_does_not_overflow() {
        let f = fixture(FakeProtectorConfig {
            ready_after_polls: 1,
            ..Default::default()
        });
        let id = dispatched(&f.store);
        let unbounded = PollOptions {
            timeout: Duration::MAX,
            interval: Duration::from_secs(1),
        };

        let record = f
            .poller
            .poll_until_done(&id, &unbounded, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.task_id, id);
    }

    #[tokio::test]
    async fn test_outstanding_tasks() {
        let f = fixture(FakeProtectorConfig::default());
        let waiting = dispatched(&f.store);
        let done = dispatched(&f.store);
        f.store.fail(&done, "enclave crashed").unwrap();

        let mut degraded = Task::new("0xowner", "0xdata");
        degraded.mark_dispatch_failed("offline").unwrap();
        f.store.submit(degraded).unwrap();

        assert_eq!(f.poller.outstanding_tasks(), vec![waiting]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_within_one_interval() {
        let f = fixture(FakeProtectorConfig {
            ready_after_polls: u32::MAX,
            ..Default::default()
        });
        let id = dispatched(&f.store);

        let started = Instant::now();
        let result = f
            .poller
            .poll_until_done(&id, &options(10, 3), &CancellationToken::new())
            .await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(ApplicationError::PollTimeout { .. })));
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(13));
        assert_eq!(f.store.get(&id).unwrap().status(), TaskStatus::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_marks_failed() {
        let f = fixture(FakeProtectorConfig {
            fail_permanently: true,
            ..Default::default()
        });
        let id = dispatched(&f.store);

        let result = f
            .poller
            .poll_until_done(&id, &options(60, 2), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ApplicationError::PollFailed { .. })));

        let task = f.store.get(&id).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.failure_reason().is_some());

        // 终态之后不再请求远程
        let calls = f.protector.result_calls();
        let again = f
            .poller
            .poll_until_done(&id, &options(60, 2), &CancellationToken::new())
            .await;
        assert!(matches!(again, Err(ApplicationError::PollFailed { .. })));
        assert_eq!(f.protector.result_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_in_flight_request() {
        let f = fixture(FakeProtectorConfig {
            latency_ms: 60_000,
            ..Default::default()
        });
        let id = dispatched(&f.store);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = f.poller.poll_until_done(&id, &options(300, 2), &cancel).await;

        assert!(matches!(result, Err(ApplicationError::Cancelled(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_ne!(f.store.get(&id).unwrap().status(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_degraded_task_is_not_polled() {
        let f = fixture(FakeProtectorConfig::default());
        let mut task = Task::new("0xowner", "0xdata");
        task.mark_dispatch_failed("no workerpool").unwrap();
        let id = task.id().to_string();
        f.store.submit(task).unwrap();

        let result = f
            .poller
            .poll_until_done(&id, &PollOptions::default(), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::SubmissionDegraded { ref reason, .. }) if reason == "no workerpool"
        ));
        assert_eq!(f.protector.result_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let f = fixture(FakeProtectorConfig::default());
        let result = f
            .poller
            .poll_until_done("missing", &PollOptions::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
    }

    #[test]
    fn test_fill_wallet_keeps_existing() {
        let raw = fill_wallet(json!({"wallet": "0xreal"}), "0xowner");
        assert_eq!(raw["wallet"], "0xreal");

        let raw = fill_wallet(json!({"country": "FRA"}), "0xowner");
        assert_eq!(raw["wallet"], "0xowner");
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_clamps_timeout() {
        let f = fixture(FakeProtectorConfig {
            ready_after_polls: u32::MAX,
            ..Default::default()
        });
        let id = dispatched(&f.store);
        let handler = PollResultHandler::new(
            Arc::new(f.poller),
            options(300, 1),
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        let started = Instant::now();
        let result = handler
            .handle(PollResultQuery {
                task_id: id,
                timeout: Some(Duration::from_secs(3600)),
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::PollTimeout { .. })));
        assert!(started.elapsed() <= Duration::from_secs(6));
    }
}

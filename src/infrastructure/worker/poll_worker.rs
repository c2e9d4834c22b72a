//! Poll Worker - Background Result Poller

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::queries::handlers::{PollOptions, TaskPoller};

/// 等待 Worker 结束的上限
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Worker 配置
#[derive(Debug, Clone)]
pub struct PollWorkerConfig {
    /// 最大并发轮询数
    pub max_concurrent: usize,
    /// 每个任务的轮询参数
    pub options: PollOptions,
    /// 扫描 TaskStore 补漏的间隔（队列满时丢失的任务由扫描接管）
    pub sweep_interval: Duration,
}

impl Default for PollWorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            options: PollOptions::default(),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// 轮询 Worker
///
/// 从队列消费已派发的任务 ID，为每个任务运行一个轮询循环。
/// 每个任务只被调度一次；定期扫描会接管从未进入队列的任务
pub struct PollWorker {
    config: PollWorkerConfig,
    queue_receiver: mpsc::Receiver<String>,
    poller: Arc<TaskPoller>,
    shutdown: CancellationToken,
}

impl PollWorker {
    pub fn new(
        config: PollWorkerConfig,
        queue_receiver: mpsc::Receiver<String>,
        poller: Arc<TaskPoller>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            queue_receiver,
            poller,
            shutdown,
        }
    }

    /// 启动 Worker，直到队列关闭或收到停止信号
    pub async fn run(mut self) {
        tracing::info!(
            max_concurrent = self.config.max_concurrent,
            interval_ms = self.config.options.interval.as_millis() as u64,
            timeout_secs = self.config.options.timeout.as_secs(),
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "PollWorker started"
        );

        // 使用 semaphore 控制并发
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut sweep = tokio::time::interval(self.config.sweep_interval.max(Duration::from_millis(1)));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 已调度过的任务
        let mut scheduled: HashSet<String> = HashSet::new();

        loop {
            let batch = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = self.queue_receiver.recv() => match next {
                    Some(id) => vec![id],
                    None => break,
                },
                _ = sweep.tick() => {
                    let missed: Vec<String> = self
                        .poller
                        .outstanding_tasks()
                        .into_iter()
                        .filter(|id| !scheduled.contains(id))
                        .collect();
                    if !missed.is_empty() {
                        tracing::warn!(count = missed.len(), "Recovered dispatched tasks missing from the poll queue");
                    }
                    missed
                }
            };

            for task_id in batch {
                if !scheduled.insert(task_id.clone()) {
                    tracing::debug!(task_id = %task_id, "Task already scheduled");
                    continue;
                }

                let permit = tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        tracing::info!("PollWorker stopped");
                        return;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => {
                            tracing::error!("Failed to acquire semaphore permit");
                            return;
                        }
                    },
                };

                let poller = self.poller.clone();
                let options = self.config.options;
                let cancel = self.shutdown.child_token();

                tokio::spawn(async move {
                    let _permit = permit; // 持有 permit 直到轮询结束
                    Self::process_task(&task_id, &poller, &options, &cancel).await;
                });
            }
        }

        tracing::info!("PollWorker stopped");
    }

    /// 轮询单个任务
    async fn process_task(
        task_id: &str,
        poller: &TaskPoller,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) {
        match poller.poll_until_done(task_id, options, cancel).await {
            Ok(record) => tracing::info!(
                task_id = %task_id,
                verified = record.verified,
                field_count = record.fields.len(),
                "Result recorded"
            ),
            Err(ApplicationError::PollTimeout { waited_ms, .. }) => tracing::warn!(
                task_id = %task_id,
                waited_ms,
                "Polling timed out, task left in processing"
            ),
            Err(ApplicationError::Cancelled(_)) => {
                tracing::debug!(task_id = %task_id, "Polling stopped by shutdown")
            }
            Err(e) => tracing::error!(task_id = %task_id, error = %e, "Polling ended with error"),
        }
    }
}

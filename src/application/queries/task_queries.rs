//! Task Queries - 任务与会话查询

use std::time::Duration;

/// 获取任务详情查询
#[derive(Debug, Clone)]
pub struct GetTaskQuery {
    pub task_id: String,
}

/// 等待任务结果查询（长轮询）
#[derive(Debug, Clone)]
pub struct PollResultQuery {
    pub task_id: String,
    /// 等待上限，None 使用配置默认值
    pub timeout: Option<Duration>,
}

/// 获取当前会话查询
#[derive(Debug, Clone)]
pub struct GetSessionQuery;

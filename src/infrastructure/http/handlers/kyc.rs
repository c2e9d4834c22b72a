//! KYC HTTP Handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use std::time::Duration;

use crate::application::{
    ApplicationError, GetTaskQuery, PollResultQuery, RetryDispatchCommand, SubmitBatchCommand,
    TaskView,
};
use crate::domain::submission::{InputArtifact, MediaType};
use crate::infrastructure::http::dto::{
    ApiResponse, ResultResponse, RetryDispatchRequest, TaskResultRequest, TaskStatusRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 读取 multipart 中的 `file` 字段
async fn read_artifacts(mut multipart: Multipart) -> Result<Vec<InputArtifact>, ApiError> {
    let mut artifacts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("passport_{}", artifacts.len() + 1));

        // 优先使用声明的类型，缺省时按扩展名推断
        let media_type = match field.content_type() {
            Some(ct) if ct != "application/octet-stream" => {
                MediaType::parse(ct).map_err(ApplicationError::from)?
            }
            _ => MediaType::from_file_name(&name).ok_or_else(|| {
                ApiError::BadRequest(format!("Cannot determine media type of {}", name))
            })?,
        };

        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?
            .to_vec();

        artifacts.push(InputArtifact::new(name, media_type, content).map_err(ApplicationError::from)?);
    }

    Ok(artifacts)
}

/// 上传护照图片并提交处理
pub async fn submit_kyc(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<TaskView>>, ApiError> {
    let artifacts = read_artifacts(multipart).await?;

    tracing::info!(file_count = artifacts.len(), "KYC submission received");

    let task = state
        .submit_handler
        .handle(SubmitBatchCommand { artifacts })
        .await?;

    let view = state.get_task_handler.handle(GetTaskQuery {
        task_id: task.id().to_string(),
    })?;
    Ok(Json(ApiResponse::success(view)))
}

/// 查询任务状态
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskStatusRequest>,
) -> Result<Json<ApiResponse<TaskView>>, ApiError> {
    let view = state.get_task_handler.handle(GetTaskQuery {
        task_id: req.task_id,
    })?;
    Ok(Json(ApiResponse::success(view)))
}

/// 等待任务结果
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskResultRequest>,
) -> Result<Json<ApiResponse<ResultResponse>>, ApiError> {
    let record = state
        .poll_result_handler
        .handle(PollResultQuery {
            task_id: req.task_id,
            timeout: req.timeout_secs.map(Duration::from_secs),
        })
        .await?;

    Ok(Json(ApiResponse::success(ResultResponse::from(record))))
}

/// 重新派发降级任务
pub async fn retry_dispatch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RetryDispatchRequest>,
) -> Result<Json<ApiResponse<TaskView>>, ApiError> {
    let task = state
        .retry_handler
        .handle(RetryDispatchCommand {
            task_id: req.task_id,
            remote_task_id: req.remote_task_id,
        })
        .await?;

    let view = state.get_task_handler.handle(GetTaskQuery {
        task_id: task.id().to_string(),
    })?;
    Ok(Json(ApiResponse::success(view)))
}

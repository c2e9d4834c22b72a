//! Session HTTP Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{GetSessionQuery, SessionInfo};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::state::AppState;

/// 当前会话
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SessionInfo>> {
    Json(ApiResponse::success(
        state.session_handler.handle(GetSessionQuery),
    ))
}

//! HTTP endpoints for the application log ring buffer.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use super::types::*;
use crate::app_logger::LogEntry;
use crate::error::{ApiJson, ApiQuery};
use crate::state::AppState;

/// GET /api/logs?limit=&level=&source=
pub(super) async fn get_logs(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<GetLogsQuery>,
) -> Json<Vec<LogEntry>> {
    let mut entries = state.log_buffer.lock().entries(0, q.level);
    if let Some(ref source) = q.source {
        entries.retain(|e| e.source == *source);
    }
    if q.limit > 0 && entries.len() > q.limit {
        entries.drain(..entries.len() - q.limit);
    }
    Json(entries)
}

/// POST /api/logs
pub(super) async fn push_log(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<PushLogBody>,
) -> (StatusCode, Json<PushLogResponse>) {
    let id = state
        .log_buffer
        .lock()
        .push(body.level, body.source, body.message, body.data);
    (StatusCode::CREATED, Json(PushLogResponse { id }))
}

/// DELETE /api/logs
pub(super) async fn clear_logs(State(state): State<Arc<AppState>>) -> StatusCode {
    state.log_buffer.lock().clear();
    StatusCode::NO_CONTENT
}

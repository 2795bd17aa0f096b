//! 방 조회 HTTP API

use crate::error::{SyncError, SyncResult};
use crate::protocol::{unix_millis, RoomInfo, RoomSummary};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tokio::time::Instant;

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "cowatch-sync",
        "timestamp": unix_millis() / 1000
    }))
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    Json(state.rooms.list_rooms())
}

/// 새 방 ID 예약
pub async fn create_room(
    State(state): State<Arc<AppState>>,
) -> SyncResult<(StatusCode, Json<serde_json::Value>)> {
    let room_id = state.rooms.reserve_room(Instant::now())?;
    tracing::info!(room_id = %room_id, "Room reserved via API");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "roomId": room_id })),
    ))
}

pub async fn validate_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "exists": state.rooms.contains(&room_id),
        "roomId": room_id,
    }))
}

pub async fn room_info(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> SyncResult<Json<RoomInfo>> {
    state
        .rooms
        .get_room(&room_id, Instant::now())
        .map(Json)
        .ok_or(SyncError::RoomNotFound(room_id))
}

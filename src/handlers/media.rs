//! 미디어 제어 핸들러
//!
//! 행위자를 제외한 방 멤버에게 중계한다. 처리할 수 없는 액션은 로그만 남기고 버린다.

use crate::error::SyncError;
use crate::protocol::{MediaKind, SyncAction};
use crate::state::AppState;
use crate::store::RoomAction;
use std::sync::Arc;
use tokio::time::Instant;

const MAX_CHAT_CHARS: usize = 2000;

/// play / pause / seek 처리
pub async fn handle_playback(
    state: Arc<AppState>,
    peer_id: &str,
    room_id: &str,
    action: SyncAction,
    position_seconds: Option<f64>,
    media_kind: Option<MediaKind>,
) {
    let room_action = RoomAction::Playback {
        action,
        position_seconds,
        media_kind,
    };
    if dispatch_action(&state, peer_id, room_id, room_action) {
        tracing::debug!(
            peer_id = %peer_id,
            room_id = %room_id,
            action = ?action,
            position = ?position_seconds,
            "Relayed playback action"
        );
    }
}

/// 미디어 로드 처리
pub async fn handle_media_load(
    state: Arc<AppState>,
    peer_id: &str,
    room_id: &str,
    media_kind: MediaKind,
    source_ref: &str,
) {
    let room_action = RoomAction::Load {
        media_kind,
        source_ref: source_ref.to_string(),
    };
    if dispatch_action(&state, peer_id, room_id, room_action) {
        tracing::info!(
            peer_id = %peer_id,
            room_id = %room_id,
            media_kind = ?media_kind,
            "Media loaded"
        );
    }
}

/// 채팅 중계
pub async fn handle_chat(state: Arc<AppState>, peer_id: &str, room_id: &str, text: &str) {
    let text: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
    if text.is_empty() {
        return;
    }
    dispatch_action(&state, peer_id, room_id, RoomAction::Chat { text });
}

/// 액션을 방에 적용. 실패는 다른 방 처리에 영향을 주지 않도록 여기서 흡수한다
fn dispatch_action(state: &AppState, peer_id: &str, room_id: &str, action: RoomAction) -> bool {
    match state
        .rooms
        .apply_action(room_id.trim(), peer_id, action, Instant::now(), state)
    {
        Ok(_) => true,
        Err(e @ SyncError::RoomNotFound(_)) | Err(e @ SyncError::NotAMember(_)) => {
            tracing::debug!(peer_id = %peer_id, room_id = %room_id, error = %e, "Dropped action for unknown room");
            false
        }
        Err(e) => {
            tracing::debug!(peer_id = %peer_id, room_id = %room_id, error = %e, "Dropped invalid action");
            false
        }
    }
}

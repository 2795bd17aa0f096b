//! 방 관리 핸들러

use crate::error::SyncError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;
use tokio::time::Instant;

/// 방 참여 처리
pub async fn handle_join_room(state: Arc<AppState>, peer_id: &str, room_id: &str, display_name: &str) {
    // 이전 방은 새 방 참여가 성공한 뒤에만 떠난다
    let previous = state.room_of(peer_id);

    let outcome = match state
        .rooms
        .join(room_id, peer_id, display_name, Instant::now(), state.as_ref())
    {
        Ok(outcome) => outcome,
        Err(SyncError::CapacityExceeded { max }) => {
            state.send_to_peer(
                peer_id,
                ServerMessage::RoomFull {
                    room_id: room_id.trim().to_string(),
                    max_members: max,
                },
            );
            tracing::warn!(peer_id = %peer_id, room_id = %room_id, max_members = max, "Room full, rejected join");
            return;
        }
        Err(e) => {
            state.send_to_peer(
                peer_id,
                ServerMessage::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            );
            tracing::debug!(peer_id = %peer_id, room_id = %room_id, error = %e, "Rejected join");
            return;
        }
    };

    let room_id = outcome.snapshot.room_id.clone();
    if let Some(previous) = previous.filter(|previous| *previous != room_id) {
        leave_room_internal(&state, peer_id, &previous);
    }
    state.bind_room(peer_id, Some(room_id.clone()));

    if let Some(generation) = outcome.catch_up_generation {
        schedule_catch_up(state.clone(), peer_id.to_string(), room_id.clone(), generation);
    }

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        display_name = %outcome.snapshot.display_name,
        member_count = outcome.snapshot.member_names.len(),
        has_media = outcome.snapshot.media.is_some(),
        "User joined room"
    );
}

/// media-loaded 이후 재생기가 준비될 시간을 두고 강제 seek 전송
fn schedule_catch_up(state: Arc<AppState>, peer_id: String, room_id: String, generation: u64) {
    let delay = state.config.sync.catch_up_delay();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let sent = state
            .rooms
            .catch_up(&room_id, &peer_id, generation, Instant::now(), state.as_ref());
        if sent {
            tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Sent late-join catch-up");
        } else {
            tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Catch-up no longer applies");
        }
    });
}

/// 방 나가기 내부 로직
pub fn leave_room_internal(state: &AppState, peer_id: &str, room_id: &str) {
    if let Some(outcome) = state.rooms.leave(room_id, peer_id, state) {
        tracing::info!(
            peer_id = %peer_id,
            room_id = %room_id,
            display_name = %outcome.display_name,
            remaining = outcome.remaining,
            "User left room"
        );
    }
}

/// 방 나가기 처리
pub async fn handle_leave_room(state: Arc<AppState>, peer_id: &str) {
    if let Some(room_id) = state.room_of(peer_id) {
        leave_room_internal(&state, peer_id, &room_id);
        state.bind_room(peer_id, None);
    }
}

/// 활동이 없는 멤버 정리
pub async fn evict_idle_members(state: Arc<AppState>) {
    let idle_timeout = state.config.room.idle_timeout();
    let rooms_before = state.rooms.len();
    let evicted = state.rooms.evict_idle(Instant::now(), idle_timeout, state.as_ref());

    for eviction in &evicted {
        // 같은 연결이 이미 다른 방으로 옮겼으면 그대로 둔다
        if state.room_of(&eviction.connection_id).as_deref() == Some(eviction.room_id.as_str()) {
            state.bind_room(&eviction.connection_id, None);
        }
        tracing::info!(
            peer_id = %eviction.connection_id,
            room_id = %eviction.room_id,
            display_name = %eviction.display_name,
            "Evicted idle member"
        );
    }

    let removed_rooms = rooms_before.saturating_sub(state.rooms.len());
    if !evicted.is_empty() || removed_rooms > 0 {
        tracing::info!(
            evicted_members = evicted.len(),
            removed_rooms = removed_rooms,
            "Cleanup completed"
        );
    }
}

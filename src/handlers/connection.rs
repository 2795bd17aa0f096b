//! 연결 핸들러

use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 새 연결 등록. 발급한 소켓 ID를 `connected`로 알려준다
pub async fn handle_connection(state: Arc<AppState>, sender: UnboundedSender<ServerMessage>) -> String {
    let peer_id = Uuid::new_v4().to_string();

    if sender
        .send(ServerMessage::Connected {
            socket_id: peer_id.clone(),
        })
        .is_err()
    {
        tracing::debug!(peer_id = %peer_id, "Connection closed before registration");
    }
    state.peers.insert(
        peer_id.clone(),
        PeerSession {
            room_id: None,
            sender,
            connected_at: Instant::now(),
        },
    );

    tracing::info!(peer_id = %peer_id, peers = state.peers.len(), "New connection established");
    peer_id
}

/// 연결 해제. 참여 중이던 방은 명시적 leave와 같게 처리한다
pub async fn handle_disconnect(state: Arc<AppState>, peer_id: &str) {
    let Some((_, session)) = state.peers.remove(peer_id) else {
        return;
    };
    if let Some(room_id) = session.room_id {
        crate::handlers::room::leave_room_internal(&state, peer_id, &room_id);
    }
    tracing::info!(
        peer_id = %peer_id,
        connected_secs = session.connected_at.elapsed().as_secs(),
        "Connection closed"
    );
}

/// Heartbeat 처리. 참여 중인 방의 활동 시각도 갱신
pub fn handle_heartbeat(state: &AppState, peer_id: &str) {
    if let Some(room_id) = state.room_of(peer_id) {
        state.rooms.touch(&room_id, peer_id, tokio::time::Instant::now());
    }
    state.send_to_peer(peer_id, ServerMessage::HeartbeatAck);
}

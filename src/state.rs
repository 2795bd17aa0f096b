//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::protocol::ServerMessage;
use crate::store::{Outbox, RoomStore};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 저장소 (room_id -> Room)
    pub rooms: RoomStore,
    /// 피어 세션 (peer_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RoomStore::new(config.room.max_size),
            peers: DashMap::new(),
            config: Arc::new(config),
        }
    }

    /// 피어가 현재 참여 중인 방
    pub fn room_of(&self, peer_id: &str) -> Option<String> {
        self.peers.get(peer_id).and_then(|s| s.room_id.clone())
    }

    pub fn bind_room(&self, peer_id: &str, room_id: Option<String>) {
        if let Some(mut session) = self.peers.get_mut(peer_id) {
            session.room_id = room_id;
        }
    }

    pub fn send_to_peer(&self, peer_id: &str, message: ServerMessage) {
        if let Some(session) = self.peers.get(peer_id) {
            if session.sender.send(message).is_err() {
                tracing::debug!(peer_id = %peer_id, "Peer channel closed, message dropped");
            }
        }
    }
}

impl Outbox for AppState {
    fn deliver(&self, connection_id: &str, message: ServerMessage) {
        self.send_to_peer(connection_id, message);
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    /// 현재 참여 중인 방
    pub room_id: Option<String>,
    pub sender: UnboundedSender<ServerMessage>,
    pub connected_at: Instant,
}

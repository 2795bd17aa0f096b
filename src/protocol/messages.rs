//! 클라이언트-서버 메시지 프로토콜 정의
//!
//! 모든 메시지는 `{"type": "<event-name>", "payload": {...}}` 형태로 전송된다.

use serde::{Deserialize, Serialize};

/// 서버가 대신 보내는 메시지의 actor 이름. 사용자 이름으로는 쓸 수 없다
pub const SYSTEM_ACTOR: &str = "System";

/// 미디어 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "direct")]
    DirectFile,
    #[serde(rename = "youtube")]
    YouTube,
}

/// 방에 로드된 미디어 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub source_ref: String,
    pub loaded_by: String,
}

/// 특정 시점 기준으로 외삽된 재생 상태
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub position_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Play,
    Pause,
    Seek,
}

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    JoinRoom {
        room_id: String,
        display_name: String,
    },
    LeaveRoom,

    // Playback
    Play {
        room_id: String,
        #[serde(default)]
        position_seconds: Option<f64>,
        #[serde(default)]
        media_kind: Option<MediaKind>,
    },
    Pause {
        room_id: String,
        #[serde(default)]
        position_seconds: Option<f64>,
        #[serde(default)]
        media_kind: Option<MediaKind>,
    },
    Seek {
        room_id: String,
        #[serde(default)]
        position_seconds: Option<f64>,
        #[serde(default)]
        media_kind: Option<MediaKind>,
    },
    MediaLoad {
        room_id: String,
        media_kind: MediaKind,
        source_ref: String,
    },

    // Chat
    ChatMessage {
        room_id: String,
        text: String,
    },
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected {
        socket_id: String,
    },
    HeartbeatAck,
    Error {
        code: String,
        message: String,
    },

    // Room Events
    RoomJoined {
        room_id: String,
        display_name: String,
        member_count: usize,
        member_names: Vec<String>,
        media_descriptor: Option<MediaDescriptor>,
        playback_state: PlaybackSnapshot,
        /// 미디어가 있으면 뒤따르는 catch-up에서 강제 seek가 온다
        #[serde(default)]
        force_seek: bool,
    },
    UserJoined {
        display_name: String,
        member_count: usize,
        member_names: Vec<String>,
    },
    UserLeft {
        display_name: String,
        member_count: usize,
        member_names: Vec<String>,
    },
    RoomFull {
        room_id: String,
        max_members: usize,
    },

    // Media Sync
    MediaSync {
        action: SyncAction,
        position_seconds: f64,
        actor_name: String,
        media_kind: Option<MediaKind>,
        #[serde(default)]
        force_seek: bool,
    },
    MediaLoaded {
        media_kind: MediaKind,
        source_ref: String,
        actor_name: String,
    },
    SyncCheck {
        is_playing: bool,
        position_seconds: f64,
        emitted_at: u64,
    },

    // Chat
    ChatMessage {
        actor_name: String,
        text: String,
        emitted_at: u64,
    },
}

/// 방 목록 API 응답 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub member_count: usize,
    pub member_names: Vec<String>,
    pub has_media: bool,
}

/// 방 상세 API 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: String,
    pub member_count: usize,
    pub member_names: Vec<String>,
    pub media_descriptor: Option<MediaDescriptor>,
    pub playback_state: PlaybackSnapshot,
}

/// 현재 시각 (Unix epoch 밀리초)
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

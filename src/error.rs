//! 동기화 에러 정의

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("room is full (max {max} members)")]
    CapacityExceeded { max: usize },

    #[error("room id must be 4-10 alphanumeric characters")]
    InvalidRoomIdFormat,

    #[error("unsupported media source: {0}")]
    UnsupportedMediaSource(String),

    #[error("room {0} already exists")]
    AlreadyExists(String),

    #[error("connection is not a member of room {0}")]
    NotAMember(String),

    #[error("display name must not be empty")]
    InvalidDisplayName,

    #[error("invalid playback position")]
    InvalidPosition,
}

impl SyncError {
    /// 클라이언트에 전달되는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::RoomNotFound(_) => "room-not-found",
            SyncError::CapacityExceeded { .. } => "capacity-exceeded",
            SyncError::InvalidRoomIdFormat => "invalid-room-id",
            SyncError::UnsupportedMediaSource(_) => "unsupported-media-source",
            SyncError::AlreadyExists(_) => "already-exists",
            SyncError::NotAMember(_) => "not-a-member",
            SyncError::InvalidDisplayName => "invalid-display-name",
            SyncError::InvalidPosition => "invalid-position",
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match self {
            SyncError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            SyncError::AlreadyExists(_) => StatusCode::CONFLICT,
            SyncError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            SyncError::NotAMember(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

//! HTTP / WebSocket 서버 구성

use crate::handlers;
use crate::protocol::{ClientMessage, ServerMessage, SyncAction};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderValue,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 라우터 설정
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(handlers::api::health_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/api/rooms",
            get(handlers::api::list_rooms).post(handlers::api::create_room),
        )
        .route("/api/room/:id", get(handlers::api::room_info))
        .route("/api/room/:id/validate", get(handlers::api::validate_room))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = if state.config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 동기화 점검과 유휴 멤버 정리 스케줄러 시작
pub fn spawn_background_tasks(state: Arc<AppState>) {
    let sync_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sync_state.config.sync.check_interval());
        loop {
            interval.tick().await;
            handlers::broadcast_sync_checks(sync_state.clone()).await;
        }
    });

    let cleanup_state = state;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_state.config.room.sweep_interval());
        loop {
            interval.tick().await;
            handlers::evict_idle_members(cleanup_state.clone()).await;
        }
    });
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>CoWatch Sync Server</h1><p>WebSocket endpoint: /ws</p>")
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let peer_id = handlers::handle_connection(state.clone(), tx).await;

    // 송신 태스크
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode server message"),
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &peer_id, msg).await,
                Err(e) => {
                    tracing::debug!(peer_id = %peer_id, error = %e, "Ignoring malformed message");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(state, &peer_id).await;
    // 남은 메시지를 보낼 시간을 조금 준다
    if tokio::time::timeout(Duration::from_millis(100), &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
}

/// 클라이언트 메시지 분기
pub async fn handle_client_message(state: &Arc<AppState>, peer_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(state, peer_id);
        }
        ClientMessage::JoinRoom {
            room_id,
            display_name,
        } => {
            handlers::handle_join_room(state.clone(), peer_id, &room_id, &display_name).await;
        }
        ClientMessage::LeaveRoom => {
            handlers::handle_leave_room(state.clone(), peer_id).await;
        }
        ClientMessage::Play {
            room_id,
            position_seconds,
            media_kind,
        } => {
            handlers::handle_playback(
                state.clone(),
                peer_id,
                &room_id,
                SyncAction::Play,
                position_seconds,
                media_kind,
            )
            .await;
        }
        ClientMessage::Pause {
            room_id,
            position_seconds,
            media_kind,
        } => {
            handlers::handle_playback(
                state.clone(),
                peer_id,
                &room_id,
                SyncAction::Pause,
                position_seconds,
                media_kind,
            )
            .await;
        }
        ClientMessage::Seek {
            room_id,
            position_seconds,
            media_kind,
        } => {
            handlers::handle_playback(
                state.clone(),
                peer_id,
                &room_id,
                SyncAction::Seek,
                position_seconds,
                media_kind,
            )
            .await;
        }
        ClientMessage::MediaLoad {
            room_id,
            media_kind,
            source_ref,
        } => {
            handlers::handle_media_load(state.clone(), peer_id, &room_id, media_kind, &source_ref).await;
        }
        ClientMessage::ChatMessage { room_id, text } => {
            handlers::handle_chat(state.clone(), peer_id, &room_id, &text).await;
        }
    }
}

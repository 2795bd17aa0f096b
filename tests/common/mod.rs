//! 통합 테스트 공용 도우미

#![allow(dead_code)]

use cowatch_sync::protocol::{ClientMessage, ServerMessage};
use cowatch_sync::server::handle_client_message;
use cowatch_sync::sync::{MediaPlayer, MediaSource};
use cowatch_sync::{handlers, AppState, Config};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub fn app_state() -> Arc<AppState> {
    Arc::new(AppState::new(Config::default()))
}

pub fn app_state_with(configure: impl FnOnce(&mut Config)) -> Arc<AppState> {
    let mut config = Config::default();
    configure(&mut config);
    Arc::new(AppState::new(config))
}

/// 웹소켓 대신 채널로 연결. `connected` 메시지는 미리 소비한다
pub async fn connect(state: &Arc<AppState>) -> (String, UnboundedReceiver<ServerMessage>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let peer_id = handlers::handle_connection(state.clone(), tx).await;
    match rx.try_recv() {
        Ok(ServerMessage::Connected { socket_id }) => assert_eq!(socket_id, peer_id),
        other => panic!("expected connected, got {:?}", other),
    }
    (peer_id, rx)
}

pub async fn send(state: &Arc<AppState>, peer_id: &str, msg: ClientMessage) {
    handle_client_message(state, peer_id, msg).await;
}

pub async fn join(state: &Arc<AppState>, peer_id: &str, room_id: &str, name: &str) {
    send(
        state,
        peer_id,
        ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
            display_name: name.to_string(),
        },
    )
    .await;
}

pub fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub position: f64,
    pub paused: bool,
    pub calls: Vec<String>,
}

pub struct FakePlayer {
    state: Arc<Mutex<FakeState>>,
}

impl MediaPlayer for FakePlayer {
    fn play(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.paused = false;
        s.calls.push("play".into());
    }
    fn pause(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.paused = true;
        s.calls.push("pause".into());
    }
    fn seek_to(&mut self, position_seconds: f64) {
        let mut s = self.state.lock().unwrap();
        s.position = position_seconds;
        s.calls.push(format!("seek:{}", position_seconds));
    }
    fn position(&self) -> f64 {
        self.state.lock().unwrap().position
    }
    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }
    fn destroy(&mut self) {
        self.state.lock().unwrap().calls.push("destroy".into());
    }
}

pub type FakeFactory = Box<dyn FnMut(&MediaSource) -> Box<dyn MediaPlayer> + Send>;

/// 만들 때마다 같은 상태를 공유하는 재생기 팩토리
pub fn fake_factory() -> (FakeFactory, Arc<Mutex<FakeState>>) {
    let state = Arc::new(Mutex::new(FakeState {
        paused: true,
        ..Default::default()
    }));
    let shared = state.clone();
    let factory: FakeFactory = Box::new(move |_src: &MediaSource| {
        {
            let mut s = shared.lock().unwrap();
            s.position = 0.0;
            s.paused = true;
        }
        Box::new(FakePlayer { state: shared.clone() }) as Box<dyn MediaPlayer>
    });
    (factory, state)
}

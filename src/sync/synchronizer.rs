//! 클라이언트 동기화기
//!
//! 로컬 재생기 하나를 프로토콜에 연결한다. 네트워크 I/O는 하지 않고,
//! 호출자가 넘겨준 `now` 기준으로만 판단한다.
//!
//! - 로컬 알림 → [`ClientSynchronizer::on_player_event`] → 전송할 [`ClientMessage`]
//! - 서버 메시지 → [`ClientSynchronizer::handle`] → 재생기에 적용

use crate::protocol::{ClientMessage, MediaKind, ServerMessage, SyncAction, SYSTEM_ACTOR};
use crate::sync::player::{MediaPlayer, MediaSource, PlayerEvent, PlayerFactory};
use crate::sync::suppression::SuppressionWindow;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct SyncTuning {
    pub settle_delay: Duration,
    /// 직전 동기화 메시지 이후 이 시간 안에 도착한 메시지는 버린다
    pub debounce: Duration,
    /// 명시적 액션 직후 sync-check 보정을 건너뛰는 시간
    pub post_action_grace: Duration,
    pub direct_tolerance_seconds: f64,
    pub hosted_tolerance_seconds: f64,
    pub drift_tolerance_seconds: f64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            debounce: Duration::from_millis(500),
            post_action_grace: Duration::from_millis(1000),
            direct_tolerance_seconds: 1.0,
            hosted_tolerance_seconds: 2.0,
            drift_tolerance_seconds: 2.0,
        }
    }
}

impl SyncTuning {
    fn tolerance_for(&self, kind: MediaKind) -> f64 {
        match kind {
            MediaKind::DirectFile => self.direct_tolerance_seconds,
            MediaKind::YouTube => self.hosted_tolerance_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnEcho,
    Debounced,
    Suppressed,
    PostActionGrace,
    NoPlayer,
    UnsupportedSource,
}

/// 서버 메시지 처리 결과
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Ignored(IgnoreReason),
    /// 재생기에 보정을 적용함
    Corrected { seeked: bool, state_changed: bool },
    /// 허용 오차 안이라 아무것도 하지 않음
    InTolerance,
    Loaded(MediaSource),
    Membership { member_count: usize, member_names: Vec<String> },
    Chat { actor_name: String, text: String },
    Rejected { code: String, message: String },
    Unhandled,
}

struct ActivePlayer {
    source: MediaSource,
    player: Box<dyn MediaPlayer>,
}

pub struct ClientSynchronizer<F: PlayerFactory> {
    room_id: String,
    display_name: String,
    factory: F,
    tuning: SyncTuning,
    active: Option<ActivePlayer>,
    suppression: SuppressionWindow,
    last_sync_at: Option<Instant>,
    last_action_at: Option<Instant>,
    member_names: Vec<String>,
}

impl<F: PlayerFactory> ClientSynchronizer<F> {
    pub fn new(room_id: impl Into<String>, display_name: impl Into<String>, factory: F) -> Self {
        Self::with_tuning(room_id, display_name, factory, SyncTuning::default())
    }

    pub fn with_tuning(
        room_id: impl Into<String>,
        display_name: impl Into<String>,
        factory: F,
        tuning: SyncTuning,
    ) -> Self {
        let suppression = SuppressionWindow::new(tuning.settle_delay);
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
            factory,
            tuning,
            active: None,
            suppression,
            last_sync_at: None,
            last_action_at: None,
            member_names: Vec::new(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn member_names(&self) -> &[String] {
        &self.member_names
    }

    pub fn current_source(&self) -> Option<&MediaSource> {
        self.active.as_ref().map(|a| &a.source)
    }

    pub fn player(&self) -> Option<&dyn MediaPlayer> {
        self.active.as_ref().map(|a| a.player.as_ref())
    }

    pub fn is_suppressing(&mut self, now: Instant) -> bool {
        self.suppression.is_active(now)
    }

    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::JoinRoom {
            room_id: self.room_id.clone(),
            display_name: self.display_name.clone(),
        }
    }

    pub fn heartbeat_message(&self) -> ClientMessage {
        ClientMessage::Heartbeat
    }

    pub fn chat_message(&self, text: impl Into<String>) -> ClientMessage {
        ClientMessage::ChatMessage {
            room_id: self.room_id.clone(),
            text: text.into(),
        }
    }

    /// 사용자가 직접 미디어를 로드. 로컬 재생기를 교체하고 방에 알린다
    pub fn load_local(&mut self, source: MediaSource, now: Instant) -> ClientMessage {
        let msg = ClientMessage::MediaLoad {
            room_id: self.room_id.clone(),
            media_kind: source.kind(),
            source_ref: source.source_ref().to_string(),
        };
        self.replace_player(source, now);
        msg
    }

    /// 로컬 재생기 알림 처리. 억제 중이면 에코로 보고 버린다
    pub fn on_player_event(&mut self, event: PlayerEvent, now: Instant) -> Option<ClientMessage> {
        if self.suppression.is_active(now) {
            tracing::trace!(?event, "Suppressed player echo");
            return None;
        }
        let active = self.active.as_ref()?;

        let room_id = self.room_id.clone();
        let position_seconds = Some(active.player.position());
        let media_kind = Some(active.source.kind());
        self.last_action_at = Some(now);

        let msg = match event {
            PlayerEvent::Played => ClientMessage::Play {
                room_id,
                position_seconds,
                media_kind,
            },
            PlayerEvent::Paused => ClientMessage::Pause {
                room_id,
                position_seconds,
                media_kind,
            },
            PlayerEvent::Seeked => ClientMessage::Seek {
                room_id,
                position_seconds,
                media_kind,
            },
        };
        tracing::debug!(?event, "Broadcasting local player action");
        Some(msg)
    }

    /// 서버 메시지 적용
    pub fn handle(&mut self, message: ServerMessage, now: Instant) -> SyncOutcome {
        match message {
            ServerMessage::MediaSync {
                action,
                position_seconds,
                actor_name,
                force_seek,
                ..
            } => self.apply_media_sync(action, position_seconds, &actor_name, force_seek, now),
            ServerMessage::SyncCheck {
                is_playing,
                position_seconds,
                ..
            } => self.apply_sync_check(is_playing, position_seconds, now),
            ServerMessage::MediaLoaded {
                media_kind,
                source_ref,
                actor_name,
            } => self.apply_media_loaded(media_kind, &source_ref, &actor_name, now),
            ServerMessage::RoomJoined {
                member_count,
                member_names,
                ..
            }
            | ServerMessage::UserJoined {
                member_count,
                member_names,
                ..
            }
            | ServerMessage::UserLeft {
                member_count,
                member_names,
                ..
            } => {
                self.member_names = member_names.clone();
                SyncOutcome::Membership {
                    member_count,
                    member_names,
                }
            }
            ServerMessage::ChatMessage { actor_name, text, .. } => SyncOutcome::Chat { actor_name, text },
            ServerMessage::RoomFull { max_members, .. } => SyncOutcome::Rejected {
                code: "capacity-exceeded".to_string(),
                message: format!("room is full (max {} members)", max_members),
            },
            ServerMessage::Error { code, message } => SyncOutcome::Rejected { code, message },
            ServerMessage::Connected { .. } | ServerMessage::HeartbeatAck => SyncOutcome::Unhandled,
        }
    }

    fn apply_media_sync(
        &mut self,
        action: SyncAction,
        position_seconds: f64,
        actor_name: &str,
        force_seek: bool,
        now: Instant,
    ) -> SyncOutcome {
        if actor_name != SYSTEM_ACTOR && actor_name == self.display_name {
            return SyncOutcome::Ignored(IgnoreReason::OwnEcho);
        }
        if self.debounced(now) {
            return SyncOutcome::Ignored(IgnoreReason::Debounced);
        }
        let Some(active) = self.active.as_mut() else {
            return SyncOutcome::Ignored(IgnoreReason::NoPlayer);
        };

        self.last_sync_at = Some(now);
        self.last_action_at = Some(now);
        self.suppression.begin(now);

        let tolerance = self.tuning.tolerance_for(active.source.kind());
        let force = force_seek || action == SyncAction::Seek;
        let seeked = reconcile_position(active.player.as_mut(), position_seconds, tolerance, force);

        let state_changed = match action {
            SyncAction::Play => set_playing(active.player.as_mut(), true),
            SyncAction::Pause => set_playing(active.player.as_mut(), false),
            SyncAction::Seek => false,
        };

        tracing::debug!(?action, actor = %actor_name, seeked, state_changed, "Applied media sync");
        SyncOutcome::Corrected { seeked, state_changed }
    }

    fn apply_sync_check(&mut self, is_playing: bool, position_seconds: f64, now: Instant) -> SyncOutcome {
        if self.suppression.is_active(now) {
            return SyncOutcome::Ignored(IgnoreReason::Suppressed);
        }
        if self
            .last_action_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.tuning.post_action_grace)
        {
            return SyncOutcome::Ignored(IgnoreReason::PostActionGrace);
        }
        if self.debounced(now) {
            return SyncOutcome::Ignored(IgnoreReason::Debounced);
        }
        let Some(active) = self.active.as_mut() else {
            return SyncOutcome::Ignored(IgnoreReason::NoPlayer);
        };
        self.last_sync_at = Some(now);

        let drift = (active.player.position() - position_seconds).abs();
        let state_mismatch = active.player.is_paused() == is_playing;
        if drift <= self.tuning.drift_tolerance_seconds && !state_mismatch {
            return SyncOutcome::InTolerance;
        }

        self.suppression.begin(now);
        let seeked = reconcile_position(
            active.player.as_mut(),
            position_seconds,
            self.tuning.drift_tolerance_seconds,
            false,
        );
        let state_changed = set_playing(active.player.as_mut(), is_playing);

        tracing::debug!(drift, seeked, state_changed, "Corrected drift from sync-check");
        SyncOutcome::Corrected { seeked, state_changed }
    }

    fn apply_media_loaded(
        &mut self,
        media_kind: MediaKind,
        source_ref: &str,
        actor_name: &str,
        now: Instant,
    ) -> SyncOutcome {
        // load는 행위자 이름과 관계없이 항상 적용
        match MediaSource::from_wire(media_kind, source_ref) {
            Ok(source) => {
                self.replace_player(source.clone(), now);
                tracing::debug!(actor = %actor_name, ?media_kind, "Loaded remote media");
                SyncOutcome::Loaded(source)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring remote media load");
                SyncOutcome::Ignored(IgnoreReason::UnsupportedSource)
            }
        }
    }

    fn replace_player(&mut self, source: MediaSource, now: Instant) {
        if let Some(mut old) = self.active.take() {
            old.player.destroy();
        }
        // 새 소스를 붙이면서 재생기가 내는 알림도 에코로 취급
        self.suppression.begin(now);
        let player = self.factory.create(&source);
        self.active = Some(ActivePlayer { source, player });
    }

    fn debounced(&self, now: Instant) -> bool {
        self.last_sync_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.tuning.debounce)
    }
}

/// 허용 오차를 넘거나 강제일 때만 seek
fn reconcile_position(player: &mut dyn MediaPlayer, target: f64, tolerance: f64, force: bool) -> bool {
    if force || (player.position() - target).abs() > tolerance {
        player.seek_to(target.max(0.0));
        true
    } else {
        false
    }
}

fn set_playing(player: &mut dyn MediaPlayer, playing: bool) -> bool {
    match (playing, player.is_paused()) {
        (true, true) => {
            player.play();
            true
        }
        (false, false) => {
            player.pause();
            true
        }
        _ => false,
    }
}

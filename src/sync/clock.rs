//! 재생 위치 외삽 (Clock Model)
//!
//! 저장된 `position_seconds`는 `last_update_at` 시점에만 정확하다.
//! 재생 중인 방의 현재 위치는 항상 [`PlaybackState::position_at`]으로 구한다.

use crate::protocol::{PlaybackSnapshot, SyncAction};
use tokio::time::Instant;

/// `(position, is_playing, last_update_at)`을 조회 시점 `at`의 위치로 변환
pub fn extrapolate(position_seconds: f64, is_playing: bool, last_update_at: Instant, at: Instant) -> f64 {
    if !is_playing {
        return position_seconds;
    }
    let elapsed = at.saturating_duration_since(last_update_at).as_secs_f64();
    (position_seconds + elapsed).max(0.0)
}

/// 방의 권위 있는 재생 상태
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub last_update_at: Instant,
    pub last_actor_name: String,
}

impl PlaybackState {
    pub fn new(now: Instant) -> Self {
        Self {
            is_playing: false,
            position_seconds: 0.0,
            last_update_at: now,
            last_actor_name: String::new(),
        }
    }

    pub fn position_at(&self, at: Instant) -> f64 {
        extrapolate(self.position_seconds, self.is_playing, self.last_update_at, at)
    }

    pub fn snapshot(&self, at: Instant) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: self.is_playing,
            position_seconds: self.position_at(at),
        }
    }

    /// 현재 상태를 재현하는 동기화 액션 (late-join catch-up 용)
    pub fn resume_action(&self) -> SyncAction {
        if self.is_playing {
            SyncAction::Play
        } else {
            SyncAction::Pause
        }
    }

    /// play/pause/seek 적용. 위치가 없으면 기존 위치를 외삽해서 사용
    pub fn apply(&mut self, action: SyncAction, position: Option<f64>, at: Instant, actor: &str) {
        let position = position.unwrap_or_else(|| self.position_at(at)).max(0.0);
        match action {
            SyncAction::Play => self.is_playing = true,
            SyncAction::Pause => self.is_playing = false,
            SyncAction::Seek => {}
        }
        self.position_seconds = position;
        self.last_update_at = at;
        self.last_actor_name = actor.to_string();
    }

    /// 새 미디어 로드 시 일시정지/0으로 초기화
    pub fn reset(&mut self, at: Instant, actor: &str) {
        self.is_playing = false;
        self.position_seconds = 0.0;
        self.last_update_at = at;
        self.last_actor_name = actor.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_playing_state_advances_with_wall_clock() {
        let start = Instant::now();
        for d in [0.0, 0.25, 1.0, 6.0, 3600.5] {
            let at = start + Duration::from_secs_f64(d);
            let pos = extrapolate(100.0, true, start, at);
            assert!((pos - (100.0 + d)).abs() < 1e-6, "d={} pos={}", d, pos);
        }
    }

    #[test]
    fn test_paused_state_never_moves() {
        let start = Instant::now();
        let later = start + Duration::from_secs(90);
        assert_eq!(extrapolate(42.0, false, start, later), 42.0);
        assert_eq!(extrapolate(42.0, false, later, start), 42.0);
    }

    #[test]
    fn test_query_before_update_does_not_rewind() {
        let start = Instant::now();
        let update = start + Duration::from_secs(5);
        assert_eq!(extrapolate(10.0, true, update, start), 10.0);
    }

    #[test]
    fn test_result_is_never_negative() {
        let now = Instant::now();
        assert_eq!(extrapolate(-3.0, true, now, now), 0.0);
    }

    #[test]
    fn test_apply_without_position_resolves_extrapolated_value() {
        let start = Instant::now();
        let mut state = PlaybackState::new(start);
        state.apply(SyncAction::Play, Some(10.0), start, "alice");

        let later = start + Duration::from_secs(4);
        state.apply(SyncAction::Pause, None, later, "bob");

        assert!(!state.is_playing);
        assert!((state.position_seconds - 14.0).abs() < 1e-6);
        assert_eq!(state.last_actor_name, "bob");
        assert_eq!(state.position_at(later + Duration::from_secs(30)), state.position_seconds);
    }

    #[test]
    fn test_seek_keeps_play_state() {
        let start = Instant::now();
        let mut state = PlaybackState::new(start);
        state.apply(SyncAction::Play, Some(0.0), start, "alice");
        state.apply(SyncAction::Seek, Some(300.0), start + Duration::from_secs(2), "alice");

        assert!(state.is_playing);
        assert_eq!(state.resume_action(), SyncAction::Play);
        let snap = state.snapshot(start + Duration::from_secs(3));
        assert!((snap.position_seconds - 301.0).abs() < 1e-6);
    }

    #[test]
    fn test_reset_returns_to_paused_origin() {
        let start = Instant::now();
        let mut state = PlaybackState::new(start);
        state.apply(SyncAction::Play, Some(50.0), start, "alice");
        state.reset(start + Duration::from_secs(1), "bob");

        let snap = state.snapshot(start + Duration::from_secs(10));
        assert!(!snap.is_playing);
        assert_eq!(snap.position_seconds, 0.0);
    }
}

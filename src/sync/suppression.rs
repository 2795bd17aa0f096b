//! 에코 억제 윈도우
//!
//! 프로토콜이 로컬 재생기에 변경을 적용하면 재생기는 비동기로 play/pause/seeked
//! 알림을 다시 발생시킨다. 그 알림이 재전송되지 않도록 settle 지연 동안 억제한다.
//!
//! `Idle -> Suppressing { until } -> Idle`

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionState {
    Idle,
    Suppressing { until: Instant },
}

#[derive(Debug, Clone)]
pub struct SuppressionWindow {
    settle_delay: Duration,
    state: SuppressionState,
}

impl SuppressionWindow {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            state: SuppressionState::Idle,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// 원격 변경 적용 직전에 호출. 이미 억제 중이면 마감 시각을 연장한다
    pub fn begin(&mut self, now: Instant) {
        let until = now + self.settle_delay;
        self.state = match self.state {
            SuppressionState::Suppressing { until: current } if current > until => {
                SuppressionState::Suppressing { until: current }
            }
            _ => SuppressionState::Suppressing { until },
        };
    }

    pub fn is_active(&mut self, now: Instant) -> bool {
        self.state_at(now) != SuppressionState::Idle
    }

    /// 마감 시각이 지났으면 Idle로 전이
    pub fn state_at(&mut self, now: Instant) -> SuppressionState {
        if let SuppressionState::Suppressing { until } = self.state {
            if now >= until {
                self.state = SuppressionState::Idle;
            }
        }
        self.state
    }

    pub fn clear(&mut self) {
        self.state = SuppressionState::Idle;
    }
}

//! 미디어 동기화 코어
//!
//! - [`clock`]: 저장된 재생 상태로부터 현재 위치 외삽
//! - [`player`]: 재생기 기능 인터페이스와 소스 검증
//! - [`suppression`]: 에코 억제 윈도우
//! - [`synchronizer`]: 클라이언트 측 동기화기

pub mod clock;
pub mod player;
pub mod suppression;
pub mod synchronizer;

pub use clock::{extrapolate, PlaybackState};
pub use player::{MediaPlayer, MediaSource, PlayerEvent, PlayerFactory};
pub use suppression::{SuppressionState, SuppressionWindow};
pub use synchronizer::{ClientSynchronizer, IgnoreReason, SyncOutcome, SyncTuning};

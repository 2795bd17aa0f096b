//! 주기적 동기화 점검

use crate::state::AppState;
use std::sync::Arc;
use tokio::time::Instant;

/// 모든 방 멤버에게 외삽된 재생 위치 전송
pub async fn broadcast_sync_checks(state: Arc<AppState>) {
    let rooms = state.rooms.broadcast_sync_checks(Instant::now(), state.as_ref());
    if rooms > 0 {
        tracing::trace!(rooms = rooms, "Sync check broadcast");
    }
}

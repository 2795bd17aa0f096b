//! CoWatch 미디어 동기화 서버
//!
//! 여러 클라이언트가 각자의 재생기로 같은 미디어를 보면서 하나의 재생 위치와
//! 재생/일시정지 상태를 유지하도록 중계한다.

pub mod config;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod state;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use state::AppState;

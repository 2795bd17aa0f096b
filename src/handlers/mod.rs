//! 핸들러 모듈

pub mod api;
pub mod connection;
pub mod media;
pub mod room;
pub mod sync;

pub use connection::*;
pub use media::*;
pub use room::*;
pub use sync::*;

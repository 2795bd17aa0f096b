//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub sync: SyncConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub max_size: usize,
    /// 이 시간 동안 활동이 없는 멤버는 퇴장 처리
    pub idle_timeout_ms: u64,
    pub sweep_interval_ms: u64,
}

/// 동기화 타이머 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub check_interval_ms: u64,
    /// 늦게 들어온 멤버에게 media-loaded 이후 강제 seek를 보내기까지의 지연
    pub catch_up_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            room: RoomConfig {
                max_size: 50,
                idle_timeout_ms: 120_000,
                sweep_interval_ms: 60_000,
            },
            sync: SyncConfig {
                check_interval_ms: 5_000,
                catch_up_delay_ms: 1_000,
            },
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            port: env_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            room: RoomConfig {
                max_size: env_or("MAX_ROOM_SIZE", defaults.room.max_size),
                idle_timeout_ms: env_or("MEMBER_IDLE_TIMEOUT_MS", defaults.room.idle_timeout_ms),
                sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.room.sweep_interval_ms),
            },
            sync: SyncConfig {
                check_interval_ms: env_or("SYNC_CHECK_INTERVAL_MS", defaults.sync.check_interval_ms),
                catch_up_delay_ms: env_or("CATCH_UP_DELAY_MS", defaults.sync.catch_up_delay_ms),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

impl RoomConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl SyncConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn catch_up_delay(&self) -> Duration {
        Duration::from_millis(self.catch_up_delay_ms)
    }
}

/// 값이 없거나 파싱에 실패하면 기본값 사용
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

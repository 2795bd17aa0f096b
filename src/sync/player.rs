//! 미디어 백엔드 추상화
//!
//! 동기화 로직은 [`MediaPlayer`] 인터페이스에만 의존하고, 실제 재생기가
//! 직접 파일인지 호스팅 영상인지는 알지 못한다.

use crate::error::{SyncError, SyncResult};
use crate::protocol::MediaKind;

const MAX_SOURCE_LEN: usize = 2048;
const HOSTED_ID_LEN: usize = 11;
const HOSTED_ID_MARKERS: [&str; 5] = ["youtu.be/", "v/", "embed/", "watch?v=", "&v="];

/// 재생 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    DirectFile { url: String },
    HostedVideo { id: String },
}

impl MediaSource {
    /// 와이어 형식 `(mediaKind, sourceRef)`를 검증해서 소스로 변환
    pub fn from_wire(kind: MediaKind, source_ref: &str) -> SyncResult<Self> {
        let source_ref = source_ref.trim();
        if source_ref.is_empty() || source_ref.len() > MAX_SOURCE_LEN {
            return Err(SyncError::UnsupportedMediaSource(source_ref.to_string()));
        }

        match kind {
            MediaKind::DirectFile => {
                if is_direct_url(source_ref) {
                    Ok(MediaSource::DirectFile {
                        url: source_ref.to_string(),
                    })
                } else {
                    Err(SyncError::UnsupportedMediaSource(source_ref.to_string()))
                }
            }
            MediaKind::YouTube => {
                let id = if is_hosted_id(source_ref) {
                    Some(source_ref.to_string())
                } else {
                    extract_hosted_id(source_ref)
                };
                id.map(|id| MediaSource::HostedVideo { id })
                    .ok_or_else(|| SyncError::UnsupportedMediaSource(source_ref.to_string()))
            }
        }
    }

    /// 사용자가 입력한 URL 분류. YouTube ID를 뽑을 수 있으면 호스팅 영상
    pub fn from_url(url: &str) -> SyncResult<Self> {
        match extract_hosted_id(url.trim()) {
            Some(id) => Ok(MediaSource::HostedVideo { id }),
            None => Self::from_wire(MediaKind::DirectFile, url),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaSource::DirectFile { .. } => MediaKind::DirectFile,
            MediaSource::HostedVideo { .. } => MediaKind::YouTube,
        }
    }

    pub fn source_ref(&self) -> &str {
        match self {
            MediaSource::DirectFile { url } => url,
            MediaSource::HostedVideo { id } => id,
        }
    }
}

fn is_direct_url(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let lower = s.to_ascii_lowercase();
    (s.starts_with('/') && !s.starts_with("//"))
        || lower.starts_with("http://")
        || lower.starts_with("https://")
}

fn is_hosted_id(s: &str) -> bool {
    s.len() == HOSTED_ID_LEN
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// 마지막으로 등장하는 마커 뒤에서 `#`, `&`, `?` 전까지를 ID로 사용
pub fn extract_hosted_id(url: &str) -> Option<String> {
    let (start, marker) = HOSTED_ID_MARKERS
        .iter()
        .filter_map(|m| url.rfind(m).map(|pos| (pos, *m)))
        .max_by_key(|(pos, m)| pos + m.len())?;

    let rest = &url[start + marker.len()..];
    let id: String = rest
        .chars()
        .take_while(|c| !matches!(c, '#' | '&' | '?'))
        .collect();

    is_hosted_id(&id).then_some(id)
}

/// 로컬 재생기에서 발생하는 알림
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Played,
    Paused,
    Seeked,
}

/// 재생기 기능 인터페이스
pub trait MediaPlayer: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, position_seconds: f64);
    fn position(&self) -> f64;
    fn is_paused(&self) -> bool;
    fn destroy(&mut self);
}

/// 소스 종류에 맞는 재생기 생성
pub trait PlayerFactory: Send {
    fn create(&mut self, source: &MediaSource) -> Box<dyn MediaPlayer>;
}

impl<F> PlayerFactory for F
where
    F: FnMut(&MediaSource) -> Box<dyn MediaPlayer> + Send,
{
    fn create(&mut self, source: &MediaSource) -> Box<dyn MediaPlayer> {
        self(source)
    }
}

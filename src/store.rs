//! 방 상태 저장소
//!
//! 방 하나의 모든 변경은 해당 방 엔트리의 쓰기 잠금 안에서 순서대로 처리되고,
//! 그 결과로 나가는 메시지도 같은 잠금 안에서 [`Outbox`]로 전달된다.
//! 다른 방의 처리는 서로 독립적이다.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    unix_millis, MediaDescriptor, MediaKind, PlaybackSnapshot, RoomInfo, RoomSummary, ServerMessage,
    SyncAction,
};
use crate::sync::{MediaSource, PlaybackState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub use crate::protocol::SYSTEM_ACTOR;

const ROOM_ID_MIN_LEN: usize = 4;
const ROOM_ID_MAX_LEN: usize = 10;
const GENERATED_ROOM_ID_LEN: usize = 6;
const ROOM_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// 메시지 전달 대상
pub trait Outbox {
    fn deliver(&self, connection_id: &str, message: ServerMessage);

    fn dispatch(&self, fanout: &Fanout) {
        for connection_id in &fanout.recipients {
            self.deliver(connection_id, fanout.message.clone());
        }
    }
}

/// 한 번의 상태 변경으로 발생한 브로드캐스트
#[derive(Debug, Clone, PartialEq)]
pub struct Fanout {
    pub recipients: Vec<String>,
    pub message: ServerMessage,
}

/// 방 상태를 바꾸는 액션
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    Playback {
        action: SyncAction,
        position_seconds: Option<f64>,
        media_kind: Option<MediaKind>,
    },
    Load {
        media_kind: MediaKind,
        source_ref: String,
    },
    Chat {
        text: String,
    },
}

/// 멤버 정보
#[derive(Debug, Clone)]
pub struct Member {
    pub display_name: String,
    pub joined_at: Instant,
    pub last_activity_at: Instant,
}

/// 방 정보
#[derive(Debug)]
pub struct Room {
    pub id: String,
    members: HashMap<String, Member>,
    media: Option<MediaDescriptor>,
    playback: PlaybackState,
    /// load 될 때마다 증가. 늦은 catch-up이 이전 미디어를 가리키는지 판별
    media_generation: u64,
    created_at: Instant,
}

impl Room {
    pub fn new(id: &str, now: Instant) -> Self {
        Self {
            id: id.to_string(),
            members: HashMap::new(),
            media: None,
            playback: PlaybackState::new(now),
            media_generation: 0,
            created_at: now,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn media(&self) -> Option<&MediaDescriptor> {
        self.media.as_ref()
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    /// 입장 순서대로 정렬된 이름 목록
    pub fn member_names(&self) -> Vec<String> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        members.into_iter().map(|m| m.display_name.clone()).collect()
    }

    fn recipients_except(&self, connection_id: &str) -> Vec<String> {
        self.members
            .keys()
            .filter(|id| id.as_str() != connection_id)
            .cloned()
            .collect()
    }

    fn all_recipients(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    fn apply_action(&mut self, connection_id: &str, action: RoomAction, now: Instant) -> SyncResult<Fanout> {
        let actor_name = match self.members.get_mut(connection_id) {
            Some(member) => {
                member.last_activity_at = now;
                member.display_name.clone()
            }
            None => return Err(SyncError::NotAMember(self.id.clone())),
        };
        let recipients = self.recipients_except(connection_id);

        let message = match action {
            RoomAction::Playback {
                action,
                position_seconds,
                media_kind,
            } => {
                if position_seconds.is_some_and(|p| !p.is_finite())
                    || (action == SyncAction::Seek && position_seconds.is_none())
                {
                    return Err(SyncError::InvalidPosition);
                }
                self.playback.apply(action, position_seconds, now, &actor_name);
                ServerMessage::MediaSync {
                    action,
                    position_seconds: self.playback.position_seconds,
                    actor_name,
                    media_kind: media_kind.or(self.media.as_ref().map(|m| m.kind)),
                    force_seek: action == SyncAction::Seek,
                }
            }
            RoomAction::Load {
                media_kind,
                source_ref,
            } => {
                let source = MediaSource::from_wire(media_kind, &source_ref)?;
                let descriptor = MediaDescriptor {
                    kind: source.kind(),
                    source_ref: source.source_ref().to_string(),
                    loaded_by: actor_name.clone(),
                };
                self.media = Some(descriptor);
                self.media_generation += 1;
                self.playback.reset(now, &actor_name);
                ServerMessage::MediaLoaded {
                    media_kind: source.kind(),
                    source_ref: source.source_ref().to_string(),
                    actor_name,
                }
            }
            RoomAction::Chat { text } => ServerMessage::ChatMessage {
                actor_name,
                text,
                emitted_at: unix_millis(),
            },
        };

        Ok(Fanout { recipients, message })
    }

    fn membership_message(&self, display_name: String, joined: bool) -> ServerMessage {
        let member_count = self.members.len();
        let member_names = self.member_names();
        if joined {
            ServerMessage::UserJoined {
                display_name,
                member_count,
                member_names,
            }
        } else {
            ServerMessage::UserLeft {
                display_name,
                member_count,
                member_names,
            }
        }
    }
}

/// 새 멤버에게 보내는 방 전체 스냅샷
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub display_name: String,
    pub member_names: Vec<String>,
    pub media: Option<MediaDescriptor>,
    pub playback: PlaybackSnapshot,
}

impl RoomSnapshot {
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::RoomJoined {
            room_id: self.room_id.clone(),
            display_name: self.display_name.clone(),
            member_count: self.member_names.len(),
            member_names: self.member_names.clone(),
            media_descriptor: self.media.clone(),
            playback_state: self.playback,
            force_seek: self.media.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub snapshot: RoomSnapshot,
    pub created: bool,
    /// 미디어가 있으면 지연 후 강제 seek를 보내야 한다
    pub catch_up_generation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub display_name: String,
    pub remaining: usize,
    pub room_deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Eviction {
    pub room_id: String,
    pub connection_id: String,
    pub display_name: String,
}

/// 전체 방 저장소
pub struct RoomStore {
    rooms: DashMap<String, Room>,
    max_members: usize,
}

impl RoomStore {
    pub fn new(max_members: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            max_members,
        }
    }

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// 빈 방 생성. 이미 살아있는 방이면 실패
    pub fn create_room(&self, room_id: &str, now: Instant) -> SyncResult<()> {
        let room_id = validate_room_id(room_id)?;
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(_) => Err(SyncError::AlreadyExists(room_id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(Room::new(room_id, now));
                tracing::info!(room_id = %room_id, "Room created");
                Ok(())
            }
        }
    }

    /// 임의의 새 방 ID를 생성해서 예약
    pub fn reserve_room(&self, now: Instant) -> SyncResult<String> {
        let mut last = String::new();
        for _ in 0..16 {
            last = generate_room_id();
            match self.create_room(&last, now) {
                Ok(()) => return Ok(last),
                Err(SyncError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SyncError::AlreadyExists(last))
    }

    /// 방 참여. 방이 없으면 생성한다
    pub fn join(
        &self,
        room_id: &str,
        connection_id: &str,
        display_name: &str,
        now: Instant,
        outbox: &dyn Outbox,
    ) -> SyncResult<JoinOutcome> {
        let room_id = validate_room_id(room_id)?;
        let display_name = normalize_display_name(display_name)?;

        let mut created = false;
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            created = true;
            Room::new(room_id, now)
        });

        if room.members.len() >= self.max_members && !room.members.contains_key(connection_id) {
            drop(room);
            if created {
                self.rooms.remove_if(room_id, |_, r| r.members.is_empty());
            }
            return Err(SyncError::CapacityExceeded { max: self.max_members });
        }

        room.members
            .entry(connection_id.to_string())
            .and_modify(|m| {
                m.display_name = display_name.clone();
                m.last_activity_at = now;
            })
            .or_insert_with(|| Member {
                display_name: display_name.clone(),
                joined_at: now,
                last_activity_at: now,
            });

        let snapshot = RoomSnapshot {
            room_id: room_id.to_string(),
            display_name: display_name.clone(),
            member_names: room.member_names(),
            media: room.media.clone(),
            playback: room.playback.snapshot(now),
        };

        outbox.deliver(connection_id, snapshot.to_message());
        outbox.dispatch(&Fanout {
            recipients: room.recipients_except(connection_id),
            message: room.membership_message(display_name, true),
        });

        // 재생기에 소스가 없으면 seek가 유실되므로 load를 먼저 보낸다
        let catch_up_generation = room.media.as_ref().map(|media| {
            outbox.deliver(
                connection_id,
                ServerMessage::MediaLoaded {
                    media_kind: media.kind,
                    source_ref: media.source_ref.clone(),
                    actor_name: SYSTEM_ACTOR.to_string(),
                },
            );
            room.media_generation
        });

        if created {
            tracing::info!(room_id = %room_id, "Room created");
        }

        Ok(JoinOutcome {
            snapshot,
            created,
            catch_up_generation,
        })
    }

    /// late-join 강제 seek 전송. 그 사이 미디어가 바뀌었거나 멤버가 나갔으면 보내지 않는다
    pub fn catch_up(
        &self,
        room_id: &str,
        connection_id: &str,
        generation: u64,
        now: Instant,
        outbox: &dyn Outbox,
    ) -> bool {
        let Some(room) = self.rooms.get(room_id) else {
            return false;
        };
        if !room.members.contains_key(connection_id) || room.media_generation != generation {
            return false;
        }
        let Some(media) = room.media.as_ref() else {
            return false;
        };
        outbox.deliver(
            connection_id,
            ServerMessage::MediaSync {
                action: room.playback.resume_action(),
                position_seconds: room.playback.position_at(now),
                actor_name: SYSTEM_ACTOR.to_string(),
                media_kind: Some(media.kind),
                force_seek: true,
            },
        );
        true
    }

    /// 방 나가기. 마지막 멤버였으면 방을 삭제한다
    pub fn leave(&self, room_id: &str, connection_id: &str, outbox: &dyn Outbox) -> Option<LeaveOutcome> {
        let (display_name, remaining) = {
            let mut room = self.rooms.get_mut(room_id)?;
            let member = room.members.remove(connection_id)?;
            if !room.members.is_empty() {
                outbox.dispatch(&Fanout {
                    recipients: room.all_recipients(),
                    message: room.membership_message(member.display_name.clone(), false),
                });
            }
            (member.display_name, room.members.len())
        };

        let room_deleted = remaining == 0 && self.rooms.remove_if(room_id, |_, r| r.members.is_empty()).is_some();
        if room_deleted {
            tracing::info!(room_id = %room_id, "Room deleted");
        }

        Some(LeaveOutcome {
            display_name,
            remaining,
            room_deleted,
        })
    }

    /// 재생/로드/채팅 액션 적용 후 행위자를 제외한 멤버에게 전달
    pub fn apply_action(
        &self,
        room_id: &str,
        connection_id: &str,
        action: RoomAction,
        now: Instant,
        outbox: &dyn Outbox,
    ) -> SyncResult<Fanout> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;
        let fanout = room.apply_action(connection_id, action, now)?;
        outbox.dispatch(&fanout);
        Ok(fanout)
    }

    /// 활동 시각 갱신
    pub fn touch(&self, room_id: &str, connection_id: &str, now: Instant) -> bool {
        self.rooms
            .get_mut(room_id)
            .and_then(|mut room| {
                room.members.get_mut(connection_id).map(|m| m.last_activity_at = now)
            })
            .is_some()
    }

    /// 미디어가 있는 모든 방에 외삽 위치를 담은 sync-check 전송
    pub fn broadcast_sync_checks(&self, now: Instant, outbox: &dyn Outbox) -> usize {
        let emitted_at = unix_millis();
        let mut rooms = 0;
        for room in self.rooms.iter() {
            if room.members.is_empty() || room.media.is_none() {
                continue;
            }
            let snapshot = room.playback.snapshot(now);
            outbox.dispatch(&Fanout {
                recipients: room.all_recipients(),
                message: ServerMessage::SyncCheck {
                    is_playing: snapshot.is_playing,
                    position_seconds: snapshot.position_seconds,
                    emitted_at,
                },
            });
            rooms += 1;
        }
        rooms
    }

    /// 오래 활동이 없는 멤버 퇴장 처리와 빈 방 정리
    pub fn evict_idle(&self, now: Instant, idle_timeout: Duration, outbox: &dyn Outbox) -> Vec<Eviction> {
        let mut evicted = Vec::new();

        self.rooms.retain(|room_id, room| {
            let idle: Vec<String> = room
                .members
                .iter()
                .filter(|(_, m)| now.saturating_duration_since(m.last_activity_at) > idle_timeout)
                .map(|(id, _)| id.clone())
                .collect();

            for connection_id in &idle {
                if let Some(member) = room.members.remove(connection_id) {
                    if !room.members.is_empty() {
                        outbox.dispatch(&Fanout {
                            recipients: room.all_recipients(),
                            message: room.membership_message(member.display_name.clone(), false),
                        });
                    }
                    evicted.push(Eviction {
                        room_id: room_id.clone(),
                        connection_id: connection_id.clone(),
                        display_name: member.display_name,
                    });
                }
            }

            // 예약만 되고 아무도 들어오지 않은 방은 타임아웃까지 유지
            let keep = !room.members.is_empty()
                || (idle.is_empty() && now.saturating_duration_since(room.created_at) <= idle_timeout);
            if !keep {
                tracing::info!(room_id = %room_id, "Room deleted (empty)");
            }
            keep
        });

        evicted
    }

    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|room| RoomSummary {
                id: room.id.clone(),
                member_count: room.member_count(),
                member_names: room.member_names(),
                has_media: room.media.is_some(),
            })
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    pub fn get_room(&self, room_id: &str, now: Instant) -> Option<RoomInfo> {
        self.rooms.get(room_id).map(|room| RoomInfo {
            id: room.id.clone(),
            member_count: room.member_count(),
            member_names: room.member_names(),
            media_descriptor: room.media.clone(),
            playback_state: room.playback.snapshot(now),
        })
    }
}

/// 방 ID 형식 검증 (`[A-Za-z0-9]{4,10}`)
pub fn validate_room_id(room_id: &str) -> SyncResult<&str> {
    let room_id = room_id.trim();
    let valid_len = (ROOM_ID_MIN_LEN..=ROOM_ID_MAX_LEN).contains(&room_id.len());
    if valid_len && room_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(room_id)
    } else {
        Err(SyncError::InvalidRoomIdFormat)
    }
}

pub fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_ROOM_ID_LEN)
        .map(|_| ROOM_ID_CHARSET[rng.gen_range(0..ROOM_ID_CHARSET.len())] as char)
        .collect()
}

/// 앞뒤 공백 제거 후 길이 제한. 비었거나 서버 actor 이름이면 거부
fn normalize_display_name(name: &str) -> SyncResult<String> {
    let name: String = name.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect();
    if name.is_empty() || name.eq_ignore_ascii_case(SYSTEM_ACTOR) {
        Err(SyncError::InvalidDisplayName)
    } else {
        Ok(name)
    }
}

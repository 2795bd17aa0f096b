//! 클라이언트 동기화기 두 개를 서버에 연결한 왕복 테스트

mod common;

use common::*;
use cowatch_sync::handlers;
use cowatch_sync::protocol::{ClientMessage, ServerMessage};
use cowatch_sync::sync::{ClientSynchronizer, MediaSource, PlayerEvent, SyncOutcome};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

/// 받은 메시지를 모두 동기화기에 적용하고, 그 과정에서 재생기가 낸 알림도 흘려본다
fn pump(
    sync: &mut ClientSynchronizer<FakeFactory>,
    rx: &mut UnboundedReceiver<ServerMessage>,
    echo_events: &[PlayerEvent],
) -> (Vec<SyncOutcome>, Vec<ClientMessage>) {
    let mut outcomes = Vec::new();
    let mut outgoing = Vec::new();
    for msg in drain(rx) {
        let outcome = sync.handle(msg, Instant::now());
        if matches!(outcome, SyncOutcome::Corrected { .. } | SyncOutcome::Loaded(_)) {
            for event in echo_events {
                if let Some(out) = sync.on_player_event(*event, Instant::now()) {
                    outgoing.push(out);
                }
            }
        }
        outcomes.push(outcome);
    }
    (outcomes, outgoing)
}

#[tokio::test(start_paused = true)]
async fn test_applied_changes_do_not_ping_pong() {
    let state = app_state();

    let (alice_id, mut alice_rx) = connect(&state).await;
    let (alice_factory, alice_player) = fake_factory();
    let mut alice = ClientSynchronizer::new("AB12", "alice", alice_factory);

    let (bob_id, mut bob_rx) = connect(&state).await;
    let (bob_factory, bob_player) = fake_factory();
    let mut bob = ClientSynchronizer::new("AB12", "bob", bob_factory);

    send(&state, &alice_id, alice.join_message()).await;
    send(&state, &bob_id, bob.join_message()).await;
    pump(&mut alice, &mut alice_rx, &[]);
    pump(&mut bob, &mut bob_rx, &[]);
    assert_eq!(bob.member_names().to_vec(), vec!["alice", "bob"]);

    // alice가 파일을 로드
    let source = MediaSource::from_url("/uploads/42-movie.mp4").unwrap();
    let load = alice.load_local(source.clone(), Instant::now());
    send(&state, &alice_id, load).await;

    let (outcomes, echoes) = pump(&mut bob, &mut bob_rx, &[PlayerEvent::Paused, PlayerEvent::Seeked]);
    assert_eq!(outcomes, vec![SyncOutcome::Loaded(source)]);
    assert!(echoes.is_empty(), "load side effects must not be broadcast: {:?}", echoes);

    tokio::time::advance(Duration::from_secs(2)).await;

    // alice가 재생 → bob에게 적용, bob 재생기의 알림은 억제된다
    alice_player.lock().unwrap().position = 10.0;
    let play = alice
        .on_player_event(PlayerEvent::Played, Instant::now())
        .expect("genuine user action");
    send(&state, &alice_id, play).await;

    let (outcomes, echoes) = pump(&mut bob, &mut bob_rx, &[PlayerEvent::Seeked, PlayerEvent::Played]);
    assert_eq!(
        outcomes,
        vec![SyncOutcome::Corrected {
            seeked: true,
            state_changed: true
        }]
    );
    assert!(echoes.is_empty(), "applied change echoed back: {:?}", echoes);
    {
        let bob_state = bob_player.lock().unwrap();
        assert!(!bob_state.paused);
        assert_eq!(bob_state.position, 10.0);
    }

    // alice는 자기 액션을 돌려받지 않는다
    assert!(drain(&mut alice_rx).is_empty());

    // 억제 윈도우가 지난 뒤 bob의 실제 조작은 정상 전송
    tokio::time::advance(Duration::from_secs(3)).await;
    bob_player.lock().unwrap().position = 13.0;
    let pause = bob
        .on_player_event(PlayerEvent::Paused, Instant::now())
        .expect("genuine user action");
    send(&state, &bob_id, pause).await;

    let (outcomes, echoes) = pump(&mut alice, &mut alice_rx, &[PlayerEvent::Paused]);
    assert!(matches!(outcomes[..], [SyncOutcome::Corrected { .. }]));
    assert!(echoes.is_empty());
    assert!(alice_player.lock().unwrap().paused);
}

#[tokio::test(start_paused = true)]
async fn test_sync_check_nudges_a_stalled_client() {
    let state = app_state();

    let (alice_id, _alice_rx) = connect(&state).await;
    let (bob_id, mut bob_rx) = connect(&state).await;
    let (bob_factory, bob_player) = fake_factory();
    let mut bob = ClientSynchronizer::new("AB12", "bob", bob_factory);

    join(&state, &alice_id, "AB12", "alice").await;
    send(&state, &bob_id, bob.join_message()).await;
    send(
        &state,
        &alice_id,
        ClientMessage::MediaLoad {
            room_id: "AB12".into(),
            media_kind: cowatch_sync::protocol::MediaKind::DirectFile,
            source_ref: "/uploads/42-movie.mp4".into(),
        },
    )
    .await;
    tokio::time::advance(Duration::from_secs(1)).await;
    send(
        &state,
        &alice_id,
        ClientMessage::Play {
            room_id: "AB12".into(),
            position_seconds: Some(0.0),
            media_kind: None,
        },
    )
    .await;
    pump(&mut bob, &mut bob_rx, &[]);
    assert!(!bob_player.lock().unwrap().paused);

    // bob의 재생기가 버퍼링으로 멈춰 위치가 뒤처짐
    tokio::time::advance(Duration::from_secs(10)).await;
    bob_player.lock().unwrap().position = 4.0;

    handlers::broadcast_sync_checks(state.clone()).await;
    let (outcomes, _) = pump(&mut bob, &mut bob_rx, &[]);
    assert_eq!(
        outcomes,
        vec![SyncOutcome::Corrected {
            seeked: true,
            state_changed: false
        }]
    );
    assert!((bob_player.lock().unwrap().position - 10.0).abs() < 0.01);
}

//! Session lifecycle tests: identity bootstrap, channel ownership and the
//! master's round controls.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use aicebreaker_client::session::{INTRO_ANNOUNCEMENT, READY_ANNOUNCEMENT};
use aicebreaker_client::{
    AicebreakerError, GameEvent, Identity, IdentityState, MasterSession, PlayerSession,
};

use common::{
    clients_update_json, countdown_json, recv_until, settle, test_config, wait_for_call,
    MockBackend, MockConnector, MockTransport, RecordingAudio,
};
use tokio::sync::Notify;

// ════════════════════════════════════════════════════════════════════
// Player: identity bootstrap
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn player_mount_fetches_identity_once_then_opens_its_channel() {
    let (transport, _closed) = MockTransport::scripted(&[]);
    let connector = MockConnector::new(vec![transport]);
    let backend = Arc::new(MockBackend::new("rAlice"));

    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        backend.clone(),
        connector.clone(),
        Arc::new(RecordingAudio::default()),
    )
    .await;

    let seen = recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;
    assert_eq!(
        seen,
        vec![
            GameEvent::IdentityAssigned {
                identity: Identity::new("rAlice")
            },
            GameEvent::Connected,
        ]
    );
    assert_eq!(
        session.identity_state(),
        &IdentityState::Ready(Identity::new("rAlice"))
    );
    assert!(session.is_connected());
    assert_eq!(backend.calls(), vec!["generate_client_id".to_string()]);
    assert_eq!(connector.urls(), vec!["ws://api.test/ws/rAlice".to_string()]);

    session.unmount().await;
}

#[tokio::test]
async fn identity_failure_opens_no_channel() {
    let connector = MockConnector::refusing();
    let backend = Arc::new(MockBackend::without_identity());

    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        backend.clone(),
        connector.clone(),
        Arc::new(RecordingAudio::default()),
    )
    .await;

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GameEvent::IdentityFailed { .. }), "got {ev:?}");
    assert_eq!(session.identity_state(), &IdentityState::Failed);
    assert!(!session.identity_state().is_loading());
    assert!(session.identity().is_none());
    assert!(!session.is_connected());
    assert!(connector.urls().is_empty());
    assert_eq!(backend.calls(), vec!["generate_client_id".to_string()]);

    // Nothing to close, still safe.
    session.unmount().await;
}

#[tokio::test]
async fn connect_failure_leaves_session_disconnected() {
    let connector = MockConnector::refusing();
    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        Arc::new(MockBackend::new("rAlice")),
        connector.clone(),
        Arc::new(RecordingAudio::default()),
    )
    .await;

    let seen = recv_until(&mut events, |e| {
        matches!(e, GameEvent::Disconnected { .. })
    })
    .await;
    let Some(GameEvent::Disconnected { reason: Some(reason) }) = seen.last() else {
        panic!("expected Disconnected with a reason, got {seen:?}");
    };
    assert!(reason.contains("refused"));
    assert!(!session.is_connected());
    assert_eq!(session.identity(), Some(&Identity::new("rAlice")));
    assert_eq!(session.countdown().await, None);
    assert_eq!(connector.urls().len(), 1);

    session.unmount().await;
}

// ════════════════════════════════════════════════════════════════════
// Player: channel lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn player_session_submits_at_zero() {
    let (transport, _closed) = MockTransport::scripted(&[countdown_json(1), countdown_json(0)]);
    let backend = Arc::new(MockBackend::new("rAlice"));
    let (mut session, mut events) = PlayerSession::mount(
        test_config().with_spoken_cues(false),
        backend.clone(),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;

    recv_until(&mut events, |e| {
        matches!(e, GameEvent::ResponseSubmitted { .. })
    })
    .await;
    assert_eq!(session.countdown().await, Some(0));
    assert_eq!(
        backend.calls_matching("submit:"),
        vec!["submit:rAlice:42".to_string()]
    );

    session.unmount().await;
}

#[tokio::test]
async fn switch_identity_closes_old_channel_before_opening_new() {
    let (first, first_closed) = MockTransport::scripted(&[]);
    let (second, second_closed) = MockTransport::scripted(&[]);
    let connector = MockConnector::new(vec![first, second]);

    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        Arc::new(MockBackend::new("rOld")),
        connector.clone(),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;

    session.switch_identity(Identity::new("rNew")).await;
    assert!(first_closed.load(Ordering::Relaxed));
    assert!(!second_closed.load(Ordering::Relaxed));

    let seen = recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;
    let disconnected = seen
        .iter()
        .position(|e| matches!(e, GameEvent::Disconnected { .. }))
        .expect("old channel reported closed");
    let assigned = seen
        .iter()
        .position(|e| {
            matches!(e, GameEvent::IdentityAssigned { identity } if identity.as_str() == "rNew")
        })
        .expect("new identity assigned");
    assert!(disconnected < assigned);

    assert_eq!(
        connector.urls(),
        vec![
            "ws://api.test/ws/rOld".to_string(),
            "ws://api.test/ws/rNew".to_string()
        ]
    );
    assert!(session.is_connected());

    session.unmount().await;
    assert!(second_closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn switching_to_same_identity_keeps_channel() {
    let (transport, closed) = MockTransport::scripted(&[]);
    let connector = MockConnector::new(vec![transport]);
    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        Arc::new(MockBackend::new("rSame")),
        connector.clone(),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;

    session.switch_identity(Identity::new("rSame")).await;
    assert!(!closed.load(Ordering::Relaxed));
    assert_eq!(connector.urls().len(), 1);
    assert!(session.is_connected());

    session.unmount().await;
}

#[tokio::test]
async fn unmount_closes_connected_channel() {
    let (transport, closed) = MockTransport::scripted(&[]);
    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        Arc::new(MockBackend::new("rAlice")),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;

    session.unmount().await;
    assert!(closed.load(Ordering::Relaxed));
    assert!(!session.is_connected());
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::Disconnected { .. })
    })
    .await;
}

#[tokio::test]
async fn unmount_after_server_close_still_closes() {
    let (transport, closed) = MockTransport::new(vec![None]);
    let (mut session, mut events) = PlayerSession::mount(
        test_config(),
        Arc::new(MockBackend::new("rAlice")),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::Disconnected { .. })
    })
    .await;
    assert!(!session.is_connected());

    session.unmount().await;
    session.unmount().await;
    assert!(closed.load(Ordering::Relaxed));
}

// ════════════════════════════════════════════════════════════════════
// Master
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn master_mount_opens_manager_channel() {
    let (transport, _closed) =
        MockTransport::scripted(&[clients_update_json(&[("rA", "Alice", true)])]);
    let connector = MockConnector::new(vec![transport]);
    let backend = Arc::new(MockBackend::new("unused"));

    let (mut session, mut events) = MasterSession::mount(
        test_config(),
        backend.clone(),
        connector.clone(),
        Arc::new(RecordingAudio::default()),
    )
    .await;

    recv_until(&mut events, |e| matches!(e, GameEvent::RosterUpdated { .. })).await;
    assert_eq!(connector.urls(), vec!["ws://api.test/ws/manager".to_string()]);
    assert!(session.is_connected());
    assert_eq!(session.roster().await.len(), 1);
    // The master never asks for an identity.
    assert!(backend.calls().is_empty());

    session.unmount().await;
}

#[tokio::test]
async fn start_countdown_announces_and_broadcasts() {
    let (transport, _closed) = MockTransport::scripted(&[]);
    let backend = Arc::new(MockBackend::new("unused"));
    let audio = RecordingAudio::default();
    let (mut session, mut events) = MasterSession::mount(
        test_config().with_countdown_start(7),
        backend.clone(),
        MockConnector::new(vec![transport]),
        Arc::new(audio.clone()),
    )
    .await;
    recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;

    let ack = session.start_countdown().await.expect("broadcast ack");
    assert_eq!(ack, serde_json::json!({ "message": "Countdown started" }));

    recv_until(&mut events, |e| {
        matches!(e, GameEvent::CountdownChanged { value: Some(7) })
    })
    .await;
    assert_eq!(session.countdown().await, Some(7));
    assert!(session.round_result().await.is_none());

    let calls = backend.calls();
    assert_eq!(calls.first(), Some(&format!("speak:{INTRO_ANNOUNCEMENT}")));
    assert!(calls.contains(&format!("speak:{READY_ANNOUNCEMENT}")));
    assert!(calls.contains(&"countdown:7".to_string()));
    assert_eq!(
        audio.played(),
        vec![INTRO_ANNOUNCEMENT.to_string(), READY_ANNOUNCEMENT.to_string()]
    );

    session.unmount().await;
}

#[tokio::test]
async fn failed_countdown_broadcast_keeps_local_restart() {
    let (transport, _closed) = MockTransport::scripted(&[]);
    let (mut session, mut events) = MasterSession::mount(
        test_config(),
        Arc::new(MockBackend::new("unused").failing_requests()),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;

    assert!(session.start_countdown().await.is_err());
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::CountdownChanged { value: Some(5) })
    })
    .await;
    assert_eq!(session.countdown().await, Some(5));

    session.unmount().await;
}

#[tokio::test]
async fn master_without_channel_cannot_start_a_round() {
    let backend = Arc::new(MockBackend::new("unused"));
    let (mut session, mut events) = MasterSession::mount(
        test_config(),
        backend.clone(),
        MockConnector::refusing(),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::Disconnected { .. })
    })
    .await;
    assert!(!session.is_connected());

    let err = session.start_countdown().await.unwrap_err();
    assert!(matches!(err, AicebreakerError::NotConnected));
    assert!(backend.calls().is_empty());
    assert_eq!(session.countdown().await, None);

    session.unmount().await;
}

#[tokio::test]
async fn master_cannot_restart_a_running_countdown() {
    let (transport, _closed) = MockTransport::scripted(&[countdown_json(3)]);
    let backend = Arc::new(MockBackend::new("unused"));
    let (mut session, mut events) = MasterSession::mount(
        test_config().with_spoken_cues(false),
        backend.clone(),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::CountdownChanged { value: Some(3) })
    })
    .await;

    let err = session.start_countdown().await.unwrap_err();
    assert!(matches!(err, AicebreakerError::RoundInProgress(3)));
    assert!(backend.calls().is_empty());
    assert_eq!(session.countdown().await, Some(3));

    session.unmount().await;
}

#[tokio::test]
async fn master_can_start_again_once_countdown_reaches_zero() {
    let (transport, _closed) = MockTransport::scripted(&[countdown_json(0)]);
    let backend = Arc::new(MockBackend::new("unused"));
    let (mut session, mut events) = MasterSession::mount(
        test_config().with_spoken_cues(false),
        backend.clone(),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::RoundResultChosen { .. })
    })
    .await;

    session.start_countdown().await.expect("broadcast ack");
    assert_eq!(backend.calls_matching("countdown:"), vec!["countdown:5"]);

    session.unmount().await;
}

#[tokio::test]
async fn second_start_is_refused_while_broadcast_is_pending() {
    let (transport, _closed) = MockTransport::scripted(&[]);
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(MockBackend::new("unused").gated(Arc::clone(&gate)));
    let (mut session, mut events) = MasterSession::mount(
        test_config(),
        backend.clone(),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| matches!(e, GameEvent::Connected)).await;

    let (first, second) = tokio::join!(session.start_countdown(), async {
        wait_for_call(&backend, "countdown:").await;
        let second = session.start_countdown().await;
        gate.notify_one();
        second
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(AicebreakerError::StartPending)));
    assert_eq!(backend.calls_matching("countdown:"), vec!["countdown:5"]);

    session.unmount().await;
}

#[tokio::test]
async fn edit_countdown_start_clamps_and_clears() {
    let (transport, _closed) = MockTransport::scripted(&[countdown_json(3)]);
    let (mut session, mut events) = MasterSession::mount(
        test_config().with_spoken_cues(false),
        Arc::new(MockBackend::new("unused")),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::CountdownChanged { value: Some(3) })
    })
    .await;

    session.edit_countdown_start(0);
    assert_eq!(session.countdown_start(), 1);
    recv_until(&mut events, |e| {
        matches!(e, GameEvent::CountdownChanged { value: None })
    })
    .await;
    assert_eq!(session.countdown().await, None);

    session.edit_countdown_start_text("12");
    assert_eq!(session.countdown_start(), 12);
    session.edit_countdown_start_text("abc");
    assert_eq!(session.countdown_start(), 1);

    session.unmount().await;
}

#[tokio::test]
async fn master_chooses_result_when_countdown_hits_zero() {
    let (transport, closed) = MockTransport::scripted(&[countdown_json(1), countdown_json(0)]);
    let backend = Arc::new(MockBackend::new("unused"));
    let (mut session, mut events) = MasterSession::mount(
        test_config().with_spoken_cues(false),
        backend.clone(),
        MockConnector::new(vec![transport]),
        Arc::new(RecordingAudio::default()),
    )
    .await;

    let seen = recv_until(&mut events, |e| {
        matches!(e, GameEvent::RoundResultChosen { .. })
    })
    .await;
    let Some(GameEvent::RoundResultChosen { gesture }) = seen.last().cloned() else {
        panic!("expected RoundResultChosen");
    };
    assert_eq!(session.round_result().await, Some(gesture));
    settle().await;
    assert_eq!(
        backend.calls_matching("result:"),
        vec![format!("result:{}", gesture.broadcast_label())]
    );

    session.unmount().await;
    assert!(closed.load(Ordering::Relaxed));
}

// =============
// tests/unit/supervisor_tests.rs
// =============
//! Multi-connection scenarios driven through `ConnectionSupervisor` with the
//! outbound queues observed directly.
use backend_lib::gate::JoinPolicy;
use backend_lib::storage::Storage;
use backend_lib::websocket::{ConnectionState, ConnectionSupervisor};
use meetwire_common::{
    ActivityEvent, ChatDraft, ClientEvent, CommentEvent, IceCandidateRequest, JoinMeeting,
    MessageType, PresenceEntry, ServerEvent,
};
use serde_json::json;

use crate::test_utils::{drain, schedule_meeting, setup_state};

fn join(meeting_id: &str, user_id: &str, user_name: &str) -> ClientEvent {
    ClientEvent::JoinMeeting(JoinMeeting {
        meeting_id: meeting_id.to_string(),
        user_id: user_id.to_string(),
        user_name: user_name.to_string(),
    })
}

fn presence(user_id: &str, user_name: &str, socket_id: uuid::Uuid) -> PresenceEntry {
    PresenceEntry {
        user_id: Some(user_id.to_string()),
        user_name: Some(user_name.to_string()),
        socket_id,
    }
}

#[tokio::test]
async fn test_two_users_join_the_same_meeting() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (mut alice, mut rx_a) = ConnectionSupervisor::connect(state.clone());
    let (mut bob, mut rx_b) = ConnectionSupervisor::connect(state.clone());

    alice.handle(join("m1", "A", "Alice")).await;
    assert_eq!(drain(&mut rx_a), vec![ServerEvent::ConnectedUsers(vec![])]);

    bob.handle(join("m1", "B", "Bob")).await;
    assert_eq!(
        drain(&mut rx_b),
        vec![ServerEvent::ConnectedUsers(vec![presence("A", "Alice", alice.id())])]
    );
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::UserJoined(presence("B", "Bob", bob.id()))]
    );
}

#[tokio::test]
async fn test_disconnect_announces_departure_once() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (mut alice, mut rx_a) = ConnectionSupervisor::connect(state.clone());
    let (mut bob, _rx_b) = ConnectionSupervisor::connect(state.clone());
    let (mut carol, mut rx_c) = ConnectionSupervisor::connect(state.clone());

    alice.handle(join("m1", "A", "Alice")).await;
    bob.handle(join("m1", "B", "Bob")).await;
    carol.handle(join("m2", "C", "Carol")).await;
    drain(&mut rx_a);
    drain(&mut rx_c);

    let bob_id = bob.id();
    bob.disconnect();

    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::UserLeft(presence("B", "Bob", bob_id))]
    );
    // other meetings hear nothing
    assert!(drain(&mut rx_c).is_empty());
    assert!(!state.rooms.members_of("meeting-m1").contains(&bob_id));
    assert_eq!(state.connections.len(), 2);
}

#[tokio::test]
async fn test_unidentified_disconnect_is_silent() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (mut alice, mut rx_a) = ConnectionSupervisor::connect(state.clone());
    let (mut lurker, _rx) = ConnectionSupervisor::connect(state.clone());

    alice.handle(join("m1", "A", "Alice")).await;
    lurker
        .handle(ClientEvent::JoinRoom("meeting-m1".to_string()))
        .await;
    assert_eq!(lurker.status(), ConnectionState::Connected);
    drain(&mut rx_a);

    lurker.disconnect();
    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(state.rooms.members_of("meeting-m1").len(), 1);
}

#[tokio::test]
async fn test_chat_reaches_every_room_member_once() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (mut a, mut rx_a) = ConnectionSupervisor::connect(state.clone());
    let (mut b, mut rx_b) = ConnectionSupervisor::connect(state.clone());
    let (mut c, mut rx_c) = ConnectionSupervisor::connect(state.clone());
    for sup in [&mut a, &mut b] {
        sup.handle(ClientEvent::JoinRoom("meeting-42".to_string()))
            .await;
    }
    c.handle(ClientEvent::JoinRoom("meeting-7".to_string()))
        .await;

    a.handle(ClientEvent::SendMessage(ChatDraft {
        content: "hi".to_string(),
        sender: "u1".to_string(),
        room: Some("meeting-42".to_string()),
        sender_name: None,
    }))
    .await;

    let stored = state.storage.room_messages("meeting-42").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].message_type, MessageType::Meeting);

    let expected = vec![ServerEvent::ReceiveMessage(stored[0].clone())];
    assert_eq!(drain(&mut rx_a), expected);
    assert_eq!(drain(&mut rx_b), expected);
    assert!(drain(&mut rx_c).is_empty());
}

#[tokio::test]
async fn test_comments_and_activity_fan_out() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (mut watcher, mut rx_w) = ConnectionSupervisor::connect(state.clone());
    let (mut poster, mut rx_p) = ConnectionSupervisor::connect(state.clone());
    watcher
        .handle(ClientEvent::JoinRoom("task-t1".to_string()))
        .await;

    let comment: CommentEvent =
        serde_json::from_value(json!({"taskId": "t1", "text": "ship it", "author": {"id": "u2"}}))
            .unwrap();
    poster.handle(ClientEvent::NewComment(comment.clone())).await;
    assert_eq!(drain(&mut rx_w), vec![ServerEvent::CommentAdded(comment)]);
    assert!(drain(&mut rx_p).is_empty());

    // a comment without a target is reported to its sender
    poster
        .handle(ClientEvent::NewComment(CommentEvent::default()))
        .await;
    assert!(matches!(drain(&mut rx_p).as_slice(), [ServerEvent::Error(_)]));

    let activity = ActivityEvent {
        task: Some("t1".to_string()),
        ..Default::default()
    };
    poster.handle(ClientEvent::NewActivity(activity.clone())).await;
    assert_eq!(
        drain(&mut rx_w),
        vec![
            ServerEvent::ActivityAdded(activity.clone()),
            ServerEvent::ActivityUpdated(activity.clone()),
        ]
    );
    assert_eq!(drain(&mut rx_p), vec![ServerEvent::ActivityUpdated(activity)]);
}

#[tokio::test]
async fn test_ice_candidate_to_departed_peer_is_dropped() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (mut a, mut rx_a) = ConnectionSupervisor::connect(state.clone());
    let (b, _rx_b) = ConnectionSupervisor::connect(state.clone());
    let b_id = b.id();
    b.disconnect();

    a.handle(ClientEvent::WebrtcIceCandidate(IceCandidateRequest {
        target: b_id,
        candidate: json!({"candidate": "candidate:1 1 UDP 1 10.0.0.1 5000 typ host"}),
    }))
    .await;

    // no error surfaces to the sender
    assert!(drain(&mut rx_a).is_empty());
}

#[tokio::test]
async fn test_strict_policy_gates_meeting_entry() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Strict);
    let meeting = schedule_meeting(&state, "org", &["p1"]).await;

    let (mut organizer, mut rx_o) = ConnectionSupervisor::connect(state.clone());
    organizer.handle(join(&meeting.id, "org", "Olive")).await;
    assert_eq!(drain(&mut rx_o), vec![ServerEvent::ConnectedUsers(vec![])]);

    let (mut stranger, mut rx_s) = ConnectionSupervisor::connect(state.clone());
    stranger.handle(join(&meeting.id, "x", "Mallory")).await;
    assert!(matches!(drain(&mut rx_s).as_slice(), [ServerEvent::Error(_)]));
    // the room never heard of the stranger
    assert!(drain(&mut rx_o).is_empty());

    let (mut anonymous, mut rx_anon) = ConnectionSupervisor::connect(state.clone());
    anonymous
        .handle(ClientEvent::JoinRoom(meeting.room()))
        .await;
    assert!(matches!(drain(&mut rx_anon).as_slice(), [ServerEvent::Error(_)]));
    assert_eq!(state.rooms.members_of(&meeting.room()).len(), 1);
}

use meshroom_core::LocalFile;
use meshroom_peer::{RoomError, RoomNotification};

use crate::integration::init_tracing;
use crate::utils::{QUIET_WINDOW_MS, TestRoom, stays_quiet};

#[tokio::test]
async fn test_leave_is_idempotent() {
    init_tracing();

    let room = TestRoom::new();
    let mut alice = room.join("alice").await.expect("Alice failed to join");

    alice.handle.leave().await;
    alice
        .wait_for(|n| matches!(n, RoomNotification::LeftRoom))
        .await
        .expect("LeftRoom missing");

    alice.handle.leave().await;
    assert!(
        stays_quiet(
            &mut alice.events,
            |n| matches!(n, RoomNotification::LeftRoom),
            QUIET_WINDOW_MS
        )
        .await,
        "LeftRoom must fire once"
    );

    assert!(!alice.handle.is_active());
    assert!(room.relay.members(&room.room_id).is_empty());

    let result = alice
        .handle
        .share_files(vec![LocalFile::new("late.txt", b"late".to_vec())])
        .await;
    assert!(matches!(result, Err(RoomError::SessionClosed)));
}

#[tokio::test]
async fn test_leave_notifies_others() {
    init_tracing();

    let room = TestRoom::new();
    let (mut alice, mut bob) = room
        .connected_pair("alice", "bob")
        .await
        .expect("Pair failed to connect");
    let alice_id = alice.id();

    alice.handle.leave().await;
    alice
        .wait_for(|n| matches!(n, RoomNotification::LeftRoom))
        .await
        .expect("LeftRoom missing");

    bob.wait_for(|n| matches!(n, RoomNotification::MemberLeft(id) if *id == alice_id))
        .await
        .expect("Bob never saw alice leave");

    // Both the leave notice and the presence removal arrive; only one is reported
    assert!(
        stays_quiet(
            &mut bob.events,
            |n| matches!(n, RoomNotification::MemberLeft(_)),
            QUIET_WINDOW_MS
        )
        .await
    );
    assert!(bob.handle.is_active());
    assert_eq!(room.relay.members(&room.room_id).len(), 1);
}

#[tokio::test]
async fn test_dropping_every_handle_leaves_room() {
    init_tracing();

    let room = TestRoom::new();
    let alice = room.join("alice").await.expect("Alice failed to join");
    let mut events = alice.events;
    drop(alice.handle);

    crate::utils::wait_for_notification(
        &mut events,
        |n| matches!(n, RoomNotification::LeftRoom),
        crate::utils::NOTIFICATION_TIMEOUT_MS,
    )
    .await
    .expect("Session did not leave");
    assert!(room.relay.members(&room.room_id).is_empty());
}

use meshroom_peer::RoomError;

use crate::integration::init_tracing;
use crate::utils::TestRoom;

#[tokio::test]
async fn test_join_fails_when_relay_unreachable() {
    init_tracing();

    let room = TestRoom::new();
    room.relay.set_available(false);

    let result = room.join("alice").await;
    assert!(matches!(result, Err(RoomError::ChannelUnavailable(_))));
    assert!(room.relay.members(&room.room_id).is_empty());

    // The failed attempt leaves nothing behind that blocks a retry
    room.relay.set_available(true);
    let alice = room.join("alice").await.expect("Retry failed");
    assert!(alice.handle.is_active());
    assert_eq!(room.relay.members(&room.room_id).len(), 1);
}

#[tokio::test]
async fn test_join_fails_when_auth_rejected() {
    init_tracing();

    let room = TestRoom::new();
    room.relay.reject_handle("mallory");

    let result = room.join("mallory").await;
    assert!(matches!(result, Err(RoomError::ChannelUnavailable(_))));
    assert!(room.relay.members(&room.room_id).is_empty());
}

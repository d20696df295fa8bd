use meshroom_core::{FileId, FileStatus, RoomId};
use meshroom_peer::{LoopbackNetwork, RoomConfig, RoomCoordinator, RoomNotification};
use serde_json::json;
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{
    NOTIFICATION_TIMEOUT_MS, QUIET_WINDOW_MS, RecordingTransportFactory, ScriptedRelay, member,
    stays_quiet, wait_for_notification,
};

#[tokio::test]
async fn test_revoke_before_offer() {
    init_tracing();

    let (relay, _published) = ScriptedRelay::new("me", vec![member("x")]);
    let coordinator = RoomCoordinator::new(
        Arc::new(relay.clone()),
        Arc::new(RecordingTransportFactory::new(LoopbackNetwork::new())),
        RoomConfig::default(),
    );
    let (handle, mut events) = coordinator
        .join(RoomId::from("room"))
        .await
        .expect("Join failed");

    relay.inject_message(
        "client-removeSharedWithMeFileRequest",
        "x",
        json!({"id": "f9"}),
    );
    assert!(
        stays_quiet(
            &mut events,
            |n| matches!(n, RoomNotification::FileRevoked(_)),
            QUIET_WINDOW_MS
        )
        .await
    );
    let snapshot = handle.snapshot().await.expect("Snapshot failed");
    assert!(snapshot.shared_with_me.is_empty());

    // The offer arriving afterwards is still recorded
    relay.inject_message(
        "client-addSharedWithMeFileRequest",
        "x",
        json!({"shareID": "f9", "name": "late.bin", "size": 3, "owner": "x", "showNotification": true}),
    );
    wait_for_notification(
        &mut events,
        |n| matches!(n, RoomNotification::FileOffered { file, .. } if file.id == FileId::from("f9")),
        NOTIFICATION_TIMEOUT_MS,
    )
    .await
    .expect("Offer missing");

    // Repeating the same offer does not duplicate or reset the entry
    relay.inject_message(
        "client-addSharedWithMeFileRequest",
        "x",
        json!({"shareID": "f9", "name": "late.bin", "size": 3, "owner": "x"}),
    );
    let snapshot = handle.snapshot().await.expect("Snapshot failed");
    assert_eq!(snapshot.shared_with_me.len(), 1);
    assert_eq!(snapshot.shared_with_me[0].status, FileStatus::ToDownload);
}

use meshroom_core::{FileId, LocalFile, MemberId, RoomId};
use meshroom_peer::{LoopbackNetwork, RelayEvent, RoomConfig, RoomCoordinator, RoomNotification};
use serde_json::json;
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{
    NOTIFICATION_TIMEOUT_MS, QUIET_WINDOW_MS, RecordingTransportFactory, ScriptedRelay, member,
    stays_quiet, wait_for_notification,
};

#[tokio::test]
async fn test_noisy_messages_are_dropped() {
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

    // Malformed payload
    relay.inject_message("client-addSharedWithMeFileRequest", "x", json!({"bogus": 1}));
    // Unknown event name
    relay.inject_message("client-somethingElse", "x", json!({}));
    // Addressed to someone else
    relay.inject_message(
        "client-addSharedWithMeFileRequest",
        "x",
        json!({"shareID": "other", "name": "n", "size": 1, "owner": "x", "toId": "z"}),
    );
    // Our own echo
    relay.inject_message(
        "client-addSharedWithMeFileRequest",
        "me",
        json!({"shareID": "echo", "name": "n", "size": 1, "owner": "me"}),
    );
    relay.inject(RelayEvent::Message {
        event: "client-addSharedWithMeFileRequest".into(),
        from: Some(MemberId::from("x")),
        payload: json!({"shareID": "good", "name": "n", "size": 1, "owner": "x", "toId": "me"}),
    });

    let first = wait_for_notification(
        &mut events,
        |n| matches!(n, RoomNotification::FileOffered { .. }),
        NOTIFICATION_TIMEOUT_MS,
    )
    .await
    .expect("Valid offer missing");
    let RoomNotification::FileOffered { file, .. } = first else {
        unreachable!();
    };
    assert_eq!(file.id, FileId::from("good"));

    let snapshot = handle.snapshot().await.expect("Snapshot failed");
    assert_eq!(snapshot.shared_with_me.len(), 1);
}

#[tokio::test]
async fn test_upload_request_from_stranger_is_dropped() {
    init_tracing();

    let (relay, _published) = ScriptedRelay::new("me", Vec::new());
    let coordinator = RoomCoordinator::new(
        Arc::new(relay.clone()),
        Arc::new(RecordingTransportFactory::new(LoopbackNetwork::new())),
        RoomConfig::default(),
    );
    let (handle, mut events) = coordinator
        .join(RoomId::from("room"))
        .await
        .expect("Join failed");

    let ids = handle
        .share_files(vec![LocalFile::new("secret.txt", b"secret".to_vec())])
        .await
        .expect("Share failed");

    relay.inject_message(
        "client-uploadSharedFileRequest",
        "stranger",
        json!({"toId": "me", "fileId": ids[0].to_string()}),
    );
    relay.inject_message(
        "client-finishedDownloading",
        "stranger",
        json!({"fileId": ids[0].to_string()}),
    );

    assert!(
        stays_quiet(
            &mut events,
            |n| matches!(
                n,
                RoomNotification::UploadStarted { .. } | RoomNotification::DownloadFinished { .. }
            ),
            QUIET_WINDOW_MS
        )
        .await
    );
    let snapshot = handle.snapshot().await.expect("Snapshot failed");
    assert!(snapshot.local_offers[0].downloaded_by.is_empty());
}

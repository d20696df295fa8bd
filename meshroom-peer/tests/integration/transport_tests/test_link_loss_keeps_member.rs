use meshroom_core::{FileStatus, LocalFile};
use meshroom_peer::{LinkState, RoomNotification, TransportEvent};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{NOTIFICATION_TIMEOUT_MS, QUIET_WINDOW_MS, TestRoom, stays_quiet};

#[tokio::test]
async fn test_link_loss_keeps_member() {
    init_tracing();

    let room = TestRoom::new();
    let (mut alice, mut bob) = room
        .connected_pair("alice", "bob")
        .await
        .expect("Pair failed to connect");
    let bob_id = bob.id();

    let ids = alice
        .handle
        .share_files(vec![LocalFile::new("report.pdf", b"quarterly".to_vec())])
        .await
        .expect("Share failed");
    let file_id = ids[0].clone();
    bob.wait_for(|n| matches!(n, RoomNotification::FileOffered { file, .. } if file.id == file_id))
        .await
        .expect("Offer never arrived");

    assert!(room.transport.inject(
        &alice.id(),
        &bob_id,
        TransportEvent::Disconnected(bob_id.clone())
    ));

    // The engine event and the snapshot command race, so poll.
    let closed = tokio::time::timeout(Duration::from_millis(NOTIFICATION_TIMEOUT_MS), async {
        loop {
            let snapshot = alice.handle.snapshot().await.expect("Snapshot failed");
            if snapshot.links.contains(&(bob_id.clone(), LinkState::Closed)) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Link never closed");
    assert!(closed.members.iter().any(|m| m.id == bob_id));

    // Still in the room, so the request goes out, but there is no link to carry it
    bob.handle
        .request_download(file_id.clone())
        .await
        .expect("Download request failed");

    assert!(
        stays_quiet(
            &mut alice.events,
            |n| matches!(n, RoomNotification::UploadStarted { .. } | RoomNotification::MemberLeft(_)),
            QUIET_WINDOW_MS
        )
        .await
    );
    assert!(
        stays_quiet(
            &mut bob.events,
            |n| matches!(n, RoomNotification::FileReceived { .. }),
            QUIET_WINDOW_MS
        )
        .await
    );

    let bob_view = bob.handle.snapshot().await.expect("Snapshot failed");
    assert_eq!(bob_view.shared_with_me[0].status, FileStatus::Downloading);

    let alice_view = alice.handle.snapshot().await.expect("Snapshot failed");
    assert!(alice_view.local_offers[0].downloaded_by.is_empty());
}

use meshroom_core::{FileStatus, LocalFile};
use meshroom_peer::{RegistryError, RoomError, RoomNotification};

use crate::integration::init_tracing;
use crate::utils::TestRoom;

#[tokio::test]
async fn test_download_completes() {
    init_tracing();

    let room = TestRoom::new();
    let (mut alice, mut bob) = room
        .connected_pair("alice", "bob")
        .await
        .expect("Pair failed to connect");
    let bob_id = bob.id();

    let content: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    let ids = alice
        .handle
        .share_files(vec![LocalFile::new("clip.mp4", content.clone())])
        .await
        .expect("Share failed");
    let f1 = ids[0].clone();
    bob.wait_for(|n| matches!(n, RoomNotification::FileOffered { file, .. } if file.id == f1))
        .await
        .expect("Offer never arrived");

    bob.handle
        .request_download(f1.clone())
        .await
        .expect("Download request failed");

    let received = bob
        .wait_for(|n| matches!(n, RoomNotification::FileReceived { file_id, .. } if *file_id == f1))
        .await
        .expect("File never arrived");
    let RoomNotification::FileReceived { name, data, .. } = received else {
        unreachable!();
    };
    assert_eq!(name, "clip.mp4");
    assert_eq!(data.as_ref(), content.as_slice());

    alice
        .wait_for(|n| matches!(n, RoomNotification::UploadStarted { file_id, to } if *file_id == f1 && *to == bob_id))
        .await
        .expect("Upload never started");
    alice
        .wait_for(|n| matches!(n, RoomNotification::DownloadFinished { file_id, by } if *file_id == f1 && *by == bob_id))
        .await
        .expect("Receipt never arrived");

    let alice_view = alice.handle.snapshot().await.expect("Snapshot failed");
    assert!(alice_view.local_offers[0].downloaded_by.contains(&bob_id));

    let bob_view = bob.handle.snapshot().await.expect("Snapshot failed");
    assert_eq!(bob_view.shared_with_me[0].status, FileStatus::Downloaded);

    // Status never moves backwards
    let again = bob.handle.request_download(f1.clone()).await;
    assert!(matches!(
        again,
        Err(RoomError::Registry(RegistryError::InvalidTransition {
            from: FileStatus::Downloaded,
            ..
        }))
    ));
}

use meshroom_core::{FileId, FileStatus, LocalFile};
use meshroom_peer::{RegistryError, RoomError, RoomNotification};

use crate::integration::init_tracing;
use crate::utils::TestRoom;

#[tokio::test]
async fn test_download_of_unknown_file_is_rejected() {
    init_tracing();

    let room = TestRoom::new();
    let bob = room.join("bob").await.expect("Bob failed to join");

    let result = bob.handle.request_download(FileId::from("missing")).await;
    assert!(matches!(
        result,
        Err(RoomError::Registry(RegistryError::UnknownFile(_)))
    ));
}

#[tokio::test]
async fn test_download_after_owner_left_is_rejected() {
    init_tracing();

    let room = TestRoom::new();
    let (alice, mut bob) = room
        .connected_pair("alice", "bob")
        .await
        .expect("Pair failed to connect");

    let ids = alice
        .handle
        .share_files(vec![LocalFile::new("clip.mp4", vec![0u8; 32])])
        .await
        .expect("Share failed");
    let f1 = ids[0].clone();
    bob.wait_for(|n| matches!(n, RoomNotification::FileOffered { file, .. } if file.id == f1))
        .await
        .expect("Offer never arrived");

    // Alice vanishes before she can serve the request
    alice.handle.leave().await;
    bob.wait_for(|n| matches!(n, RoomNotification::MemberLeft(_)))
        .await
        .expect("Departure not reported");

    let result = bob.handle.request_download(f1).await;
    assert!(matches!(
        result,
        Err(RoomError::Registry(RegistryError::UnknownFile(_)))
    ));
}

#[tokio::test]
async fn test_repeated_request_is_rejected() {
    init_tracing();

    let room = TestRoom::new();
    let (alice, mut bob) = room
        .connected_pair("alice", "bob")
        .await
        .expect("Pair failed to connect");

    let ids = alice
        .handle
        .share_files(vec![LocalFile::new("clip.mp4", vec![0u8; 32])])
        .await
        .expect("Share failed");
    let f1 = ids[0].clone();
    bob.wait_for(|n| matches!(n, RoomNotification::FileOffered { file, .. } if file.id == f1))
        .await
        .expect("Offer never arrived");

    bob.handle
        .request_download(f1.clone())
        .await
        .expect("First request failed");

    // Depending on timing the transfer may already be done
    match bob.handle.request_download(f1.clone()).await {
        Err(RoomError::Registry(RegistryError::InvalidTransition { from, to, .. })) => {
            assert!(from > FileStatus::ToDownload);
            assert_eq!(to, FileStatus::Downloading);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

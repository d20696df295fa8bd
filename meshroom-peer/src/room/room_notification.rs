use bytes::Bytes;
use meshroom_core::{FileId, Member, MemberId, SharedWithMeFile};

/// State changes surfaced to the UI layer, in the order the session applied them.
#[derive(Debug, Clone)]
pub enum RoomNotification {
    MemberJoined(Member),
    MemberLeft(MemberId),

    /// Link to the member can now carry file bytes.
    PeerConnected(MemberId),

    FileOffered {
        file: SharedWithMeFile,
        show_notification: bool,
    },
    FileRevoked(FileId),

    /// We started sending one of our files to `to`.
    UploadStarted { file_id: FileId, to: MemberId },

    /// `by` confirmed it holds one of our files.
    DownloadFinished { file_id: FileId, by: MemberId },

    /// A file we asked for arrived in full.
    FileReceived {
        file_id: FileId,
        name: String,
        data: Bytes,
    },

    LeftRoom,
}

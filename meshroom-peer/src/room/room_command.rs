use crate::error::RoomError;
use crate::mesh::LinkState;
use meshroom_core::{FileId, LocalFile, Member, MemberId, SharedFile, SharedWithMeFile};
use tokio::sync::oneshot;

/// Requests from a [`RoomHandle`](crate::RoomHandle) to its session.
#[derive(Debug)]
pub enum RoomCommand {
    ShareFiles {
        files: Vec<LocalFile>,
        reply: oneshot::Sender<Result<Vec<FileId>, RoomError>>,
    },

    RemoveSharedFile {
        id: FileId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Ask the owner of a remote offer to start sending it.
    RequestDownload {
        id: FileId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Ask a member to re-announce everything it offers.
    RequestSharedFiles {
        member_id: MemberId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    Leave {
        reply: oneshot::Sender<()>,
    },
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub member_id: MemberId,
    pub members: Vec<Member>,
    pub links: Vec<(MemberId, LinkState)>,
    pub local_offers: Vec<SharedFile>,
    pub shared_with_me: Vec<SharedWithMeFile>,
}

use crate::error::RoomError;
use crate::room::{RoomCommand, RoomSnapshot};
use meshroom_core::{FileId, LocalFile, MemberId, RoomId};
use tokio::sync::{mpsc, oneshot};

/// Cloneable command surface of a running room session.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    member_id: MemberId,
    command_tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(room_id: RoomId, member_id: MemberId, command_tx: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            room_id,
            member_id,
            command_tx,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Our relay-assigned id in this room.
    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    /// `false` once the session has left the room.
    pub fn is_active(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Offers and announces each file. Returns the new ids in input order.
    pub async fn share_files(&self, files: Vec<LocalFile>) -> Result<Vec<FileId>, RoomError> {
        self.request(|reply| RoomCommand::ShareFiles { files, reply })
            .await?
    }

    pub async fn remove_shared_file(&self, id: FileId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RemoveSharedFile { id, reply })
            .await?
    }

    /// Asks the owner of `id` to send it. Progress arrives as notifications.
    pub async fn request_download(&self, id: FileId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RequestDownload { id, reply })
            .await?
    }

    pub async fn request_shared_files(&self, member_id: MemberId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RequestSharedFiles { member_id, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Leaves the room. Calling it again, or after the session ended, does nothing.
    pub async fn leave(&self) {
        let _ = self.request(|reply| RoomCommand::Leave { reply }).await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::SessionClosed)?;
        reply_rx.await.map_err(|_| RoomError::SessionClosed)
    }
}

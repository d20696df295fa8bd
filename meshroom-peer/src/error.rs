use meshroom_core::{FileId, FileStatus, MemberId, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    /// Relay unreachable, auth rejected or publish failed.
    #[error("relay channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("unknown peer {0}")]
    UnknownPeer(MemberId),

    #[error("peer {0} is not connected")]
    PeerNotConnected(MemberId),

    #[error("transport failure for {member}: {message}")]
    Transport { member: MemberId, message: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("room session has ended")]
    SessionClosed,
}

impl RoomError {
    pub(crate) fn transport(member: &MemberId, err: anyhow::Error) -> Self {
        Self::Transport {
            member: member.clone(),
            message: format!("{err:#}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("file {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: FileId,
        from: FileStatus,
        to: FileStatus,
    },

    #[error("unknown file {0}")]
    UnknownFile(FileId),
}

mod error;
mod room_message;
mod transfer_frame;

pub use error::ProtocolError;
pub use room_message::{
    CLIENT_EVENT_PREFIX, DownloadReceipt, FileAnnouncement, FileRevocation, LeaveNotice,
    RoomMessage, SharedFilesRequest, UploadRequest, signal_event_name,
};
pub use transfer_frame::TransferFrame;

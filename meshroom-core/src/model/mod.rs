mod file;
mod member;
mod room;
mod signaling;

pub use file::{FileId, FileStatus, LocalFile, SharedFile, SharedWithMeFile};
pub use member::{Member, MemberId, MemberProfile};
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalData, SignalEnvelope};

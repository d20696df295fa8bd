use bytes::Bytes;
use meshroom_core::{FileId, MemberId, SignalData};

/// Callbacks from transport engines, drained by the room session.
/// The `MemberId` is always the remote side of the link.
#[derive(Debug)]
pub enum TransportEvent {
    /// Negotiation blob that must reach the remote member through the relay.
    Signal(MemberId, SignalData),

    /// Link is up and can carry file bytes.
    Connected(MemberId),

    /// Link failed or was dropped by the remote side.
    Disconnected(MemberId),

    /// Remote member began sending us a file.
    TransferStarted(MemberId, FileId),

    /// All bytes of a file from the remote member arrived.
    TransferFinished(MemberId, FileId, Bytes),
}

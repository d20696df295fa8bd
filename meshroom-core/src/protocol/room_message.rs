use crate::model::{FileId, MemberId, SignalEnvelope};
use crate::protocol::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relays only forward client events carrying this prefix.
pub const CLIENT_EVENT_PREFIX: &str = "client-";

const ADD_SHARED_WITH_ME_FILE: &str = "addSharedWithMeFileRequest";
const REMOVE_SHARED_WITH_ME_FILE: &str = "removeSharedWithMeFileRequest";
const SEND_SHARED_FILES: &str = "sendSharedFilesRequest";
const UPLOAD_SHARED_FILE: &str = "uploadSharedFileRequest";
const FINISHED_DOWNLOADING: &str = "finishedDownloading";
const LEAVE_ROOM: &str = "leaveRoomRequest";
const SIGNAL: &str = "signal-";

/// Event name on which signaling for `member` travels.
pub fn signal_event_name(member: &MemberId) -> String {
    format!("{CLIENT_EVENT_PREFIX}{SIGNAL}{member}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileAnnouncement {
    #[serde(rename = "shareID")]
    pub share_id: FileId,
    pub name: String,
    pub size: u64,
    pub owner: MemberId,
    #[serde(default)]
    pub show_notification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<MemberId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRevocation {
    pub id: FileId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedFilesRequest {
    pub to_id: MemberId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub to_id: MemberId,
    pub file_id: FileId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReceipt {
    pub file_id: FileId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaveNotice {}

/// Every message members exchange over the relay channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomMessage {
    AddSharedWithMeFile(FileAnnouncement),
    RemoveSharedWithMeFile(FileRevocation),
    SendSharedFiles(SharedFilesRequest),
    UploadSharedFile(UploadRequest),
    FinishedDownloading(DownloadReceipt),
    LeaveRoom(LeaveNotice),
    /// Addressed through the event name rather than `toId`.
    Signal {
        to: MemberId,
        envelope: SignalEnvelope,
    },
}

impl RoomMessage {
    /// Event names every member binds, independent of its own id.
    pub fn room_event_names() -> Vec<String> {
        [
            ADD_SHARED_WITH_ME_FILE,
            REMOVE_SHARED_WITH_ME_FILE,
            SEND_SHARED_FILES,
            UPLOAD_SHARED_FILE,
            FINISHED_DOWNLOADING,
            LEAVE_ROOM,
        ]
        .iter()
        .map(|name| format!("{CLIENT_EVENT_PREFIX}{name}"))
        .collect()
    }

    pub fn event_name(&self) -> String {
        let name = match self {
            RoomMessage::AddSharedWithMeFile(_) => ADD_SHARED_WITH_ME_FILE,
            RoomMessage::RemoveSharedWithMeFile(_) => REMOVE_SHARED_WITH_ME_FILE,
            RoomMessage::SendSharedFiles(_) => SEND_SHARED_FILES,
            RoomMessage::UploadSharedFile(_) => UPLOAD_SHARED_FILE,
            RoomMessage::FinishedDownloading(_) => FINISHED_DOWNLOADING,
            RoomMessage::LeaveRoom(_) => LEAVE_ROOM,
            RoomMessage::Signal { to, .. } => return signal_event_name(to),
        };
        format!("{CLIENT_EVENT_PREFIX}{name}")
    }

    /// `toId` of a targeted message. Receivers with a different id must ignore it.
    pub fn addressed_to(&self) -> Option<&MemberId> {
        match self {
            RoomMessage::AddSharedWithMeFile(m) => m.to_id.as_ref(),
            RoomMessage::SendSharedFiles(m) => Some(&m.to_id),
            RoomMessage::UploadSharedFile(m) => Some(&m.to_id),
            _ => None,
        }
    }

    pub fn to_payload(&self) -> Result<Value, ProtocolError> {
        let value = match self {
            RoomMessage::AddSharedWithMeFile(m) => serde_json::to_value(m)?,
            RoomMessage::RemoveSharedWithMeFile(m) => serde_json::to_value(m)?,
            RoomMessage::SendSharedFiles(m) => serde_json::to_value(m)?,
            RoomMessage::UploadSharedFile(m) => serde_json::to_value(m)?,
            RoomMessage::FinishedDownloading(m) => serde_json::to_value(m)?,
            RoomMessage::LeaveRoom(m) => serde_json::to_value(m)?,
            RoomMessage::Signal { envelope, .. } => serde_json::to_value(envelope)?,
        };
        Ok(value)
    }

    pub fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError> {
        let name = event
            .strip_prefix(CLIENT_EVENT_PREFIX)
            .ok_or_else(|| ProtocolError::UnknownEvent(event.to_owned()))?;

        if let Some(target) = name.strip_prefix(SIGNAL) {
            if target.is_empty() {
                return Err(ProtocolError::UnknownEvent(event.to_owned()));
            }
            return Ok(RoomMessage::Signal {
                to: MemberId::from(target),
                envelope: parse(event, payload)?,
            });
        }

        let message = match name {
            ADD_SHARED_WITH_ME_FILE => RoomMessage::AddSharedWithMeFile(parse(event, payload)?),
            REMOVE_SHARED_WITH_ME_FILE => {
                RoomMessage::RemoveSharedWithMeFile(parse(event, payload)?)
            }
            SEND_SHARED_FILES => RoomMessage::SendSharedFiles(parse(event, payload)?),
            UPLOAD_SHARED_FILE => RoomMessage::UploadSharedFile(parse(event, payload)?),
            FINISHED_DOWNLOADING => RoomMessage::FinishedDownloading(parse(event, payload)?),
            LEAVE_ROOM => RoomMessage::LeaveRoom(parse(event, payload)?),
            _ => return Err(ProtocolError::UnknownEvent(event.to_owned())),
        };
        Ok(message)
    }
}

fn parse<T: DeserializeOwned>(event: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::Malformed {
        event: event.to_owned(),
        source,
    })
}

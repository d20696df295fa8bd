use crate::model::FileId;
use crate::protocol::ProtocolError;
use serde::{Deserialize, Serialize};

/// Framing for file bytes on a peer data channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferFrame {
    Start {
        file_id: FileId,
        size: u64,
    },
    Chunk {
        file_id: FileId,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
    End {
        file_id: FileId,
    },
}

impl TransferFrame {
    /// Splits `data` into a `Start`, zero or more `Chunk`s and an `End`.
    pub fn split(file_id: &FileId, data: &[u8], chunk_size: usize) -> Vec<TransferFrame> {
        let chunk_size = chunk_size.max(1);
        let mut frames = Vec::with_capacity(data.len() / chunk_size + 3);

        frames.push(TransferFrame::Start {
            file_id: file_id.clone(),
            size: data.len() as u64,
        });
        for chunk in data.chunks(chunk_size) {
            frames.push(TransferFrame::Chunk {
                file_id: file_id.clone(),
                data: chunk.to_vec(),
            });
        }
        frames.push(TransferFrame::End {
            file_id: file_id.clone(),
        });

        frames
    }

    pub fn file_id(&self) -> &FileId {
        match self {
            TransferFrame::Start { file_id, .. }
            | TransferFrame::Chunk { file_id, .. }
            | TransferFrame::End { file_id } => file_id,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        postcard::to_allocvec(self).map_err(|e| ProtocolError::Frame(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        postcard::from_bytes(bytes).map_err(|e| ProtocolError::Frame(e.to_string()))
    }
}

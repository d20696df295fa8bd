use crate::transport::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use meshroom_core::{FileId, MemberId, SignalData};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Produces the first offer.
    Initiator,
    /// Waits for the remote offer.
    Responder,
}

/// One negotiated connection to a remote member.
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Begins negotiation. Initiators emit their offer here, responders do nothing.
    async fn start(&self) -> Result<()>;

    async fn accept_signal(&self, data: SignalData) -> Result<()>;

    /// Streams `data` to the remote member. Returns once the bytes are handed
    /// to the link; completion is reported by the receiving side.
    async fn send_file(&self, file_id: &FileId, data: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds engines; every callback goes through `events`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        local: &MemberId,
        remote: &MemberId,
        role: PeerRole,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportEngine>>;
}

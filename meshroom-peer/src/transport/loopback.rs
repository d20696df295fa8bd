use crate::transport::{PeerRole, TransportEngine, TransportEvent, TransportFactory};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use meshroom_core::{FileId, MemberId, SignalData};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

type Endpoint = (MemberId, MemberId);

/// Shared wiring between loopback engines of every member in the process.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    endpoints: Arc<DashMap<Endpoint, mpsc::UnboundedSender<TransportEvent>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live engines.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// In-process transport. Negotiation still runs over the relay, but file
/// bytes are handed straight to the remote engine.
#[derive(Clone)]
pub struct LoopbackTransportFactory {
    network: LoopbackNetwork,
}

impl LoopbackTransportFactory {
    pub fn new(network: LoopbackNetwork) -> Self {
        Self { network }
    }
}

#[async_trait]
impl TransportFactory for LoopbackTransportFactory {
    async fn create(
        &self,
        local: &MemberId,
        remote: &MemberId,
        role: PeerRole,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportEngine>> {
        self.network
            .endpoints
            .insert((local.clone(), remote.clone()), events.clone());

        Ok(Box::new(LoopbackEngine {
            local: local.clone(),
            remote: remote.clone(),
            role,
            events,
            network: self.network.clone(),
        }))
    }
}

struct LoopbackEngine {
    local: MemberId,
    remote: MemberId,
    role: PeerRole,
    events: mpsc::UnboundedSender<TransportEvent>,
    network: LoopbackNetwork,
}

impl LoopbackEngine {
    fn emit(&self, event: TransportEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("room session for {} is gone", self.local))
    }
}

#[async_trait]
impl TransportEngine for LoopbackEngine {
    async fn start(&self) -> Result<()> {
        if self.role == PeerRole::Responder {
            return Ok(());
        }
        self.emit(TransportEvent::Signal(
            self.remote.clone(),
            SignalData::Offer {
                sdp: format!("loopback:{}", self.local),
            },
        ))
    }

    async fn accept_signal(&self, data: SignalData) -> Result<()> {
        match data {
            SignalData::Offer { .. } => {
                self.emit(TransportEvent::Signal(
                    self.remote.clone(),
                    SignalData::Answer {
                        sdp: format!("loopback:{}", self.local),
                    },
                ))?;
                self.emit(TransportEvent::Connected(self.remote.clone()))
            }
            SignalData::Answer { .. } => self.emit(TransportEvent::Connected(self.remote.clone())),
            SignalData::IceCandidate { .. } => Ok(()),
        }
    }

    async fn send_file(&self, file_id: &FileId, data: Bytes) -> Result<()> {
        let peer = self
            .network
            .endpoints
            .get(&(self.remote.clone(), self.local.clone()))
            .map(|tx| tx.clone())
            .ok_or_else(|| anyhow!("no loopback endpoint for {}", self.remote))?;

        debug!("Loopback transfer {} -> {} ({} bytes)", self.local, self.remote, data.len());
        peer.send(TransportEvent::TransferStarted(self.local.clone(), file_id.clone()))
            .map_err(|_| anyhow!("{} stopped listening", self.remote))?;
        peer.send(TransportEvent::TransferFinished(
            self.local.clone(),
            file_id.clone(),
            data,
        ))
        .map_err(|_| anyhow!("{} stopped listening", self.remote))
    }

    async fn close(&self) -> Result<()> {
        self.network
            .endpoints
            .remove(&(self.local.clone(), self.remote.clone()));
        Ok(())
    }
}

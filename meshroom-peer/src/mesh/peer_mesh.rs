use crate::error::RoomError;
use crate::mesh::{LinkState, PeerLink};
use crate::relay::RelayChannel;
use crate::transport::{PeerRole, TransportEvent, TransportFactory};
use bytes::Bytes;
use futures::future::join_all;
use meshroom_core::{FileId, MemberId, RoomMessage, SignalData, SignalEnvelope};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns one [`PeerLink`] per remote member and carries their signaling over
/// the relay.
///
/// Closed links are kept as tombstones so that late signals stay no-ops;
/// only a fresh join replaces them.
pub struct PeerMesh {
    local_id: MemberId,
    links: HashMap<MemberId, PeerLink>,
    factory: Arc<dyn TransportFactory>,
    relay: Arc<dyn RelayChannel>,
    events: mpsc::UnboundedSender<TransportEvent>,
    active: bool,
}

impl PeerMesh {
    pub fn new(
        local_id: MemberId,
        factory: Arc<dyn TransportFactory>,
        relay: Arc<dyn RelayChannel>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            local_id,
            links: HashMap::new(),
            factory,
            relay,
            events,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn link_state(&self, member_id: &MemberId) -> Option<LinkState> {
        self.links.get(member_id).map(PeerLink::state)
    }

    pub fn link_role(&self, member_id: &MemberId) -> Option<PeerRole> {
        self.links.get(member_id).map(PeerLink::role)
    }

    /// Every link including tombstones, ordered by member id.
    pub fn links(&self) -> Vec<(MemberId, LinkState)> {
        let mut links: Vec<_> = self
            .links
            .values()
            .map(|link| (link.member_id().clone(), link.state()))
            .collect();
        links.sort_by(|a, b| a.0.cmp(&b.0));
        links
    }

    /// Opens a link to `member_id` unless a live one exists.
    pub async fn on_member_joined(
        &mut self,
        member_id: &MemberId,
        role: PeerRole,
    ) -> Result<(), RoomError> {
        if !self.active || member_id == &self.local_id {
            return Ok(());
        }
        if let Some(state) = self.link_state(member_id) {
            if state != LinkState::Closed {
                debug!("Link to {} already {:?}", member_id, state);
                return Ok(());
            }
        }
        self.open_link(member_id, role).await
    }

    /// Feeds a remote signal into its link, creating a responder link for
    /// members we have not seen yet.
    pub async fn on_signal_received(
        &mut self,
        from: &MemberId,
        data: SignalData,
    ) -> Result<(), RoomError> {
        if !self.active {
            debug!("Room inactive, dropping signal from {}", from);
            return Ok(());
        }

        match self.link_state(from) {
            Some(LinkState::Closed) => {
                debug!("Ignoring stale signal from {}", from);
                return Ok(());
            }
            Some(_) => {}
            None => {
                info!("Signal from {} before any join, answering as responder", from);
                self.open_link(from, PeerRole::Responder).await?;
            }
        }

        let Some(engine) = self.links.get(from).and_then(PeerLink::engine) else {
            return Ok(());
        };
        engine
            .accept_signal(data)
            .await
            .map_err(|e| RoomError::transport(from, e))
    }

    /// Publishes a signal our engine produced for `to`.
    pub async fn relay_signal(&self, to: &MemberId, data: SignalData) -> Result<(), RoomError> {
        if !self.active {
            return Ok(());
        }
        let message = RoomMessage::Signal {
            to: to.clone(),
            envelope: SignalEnvelope {
                user_id: self.local_id.clone(),
                data,
            },
        };
        self.relay
            .publish(&message.event_name(), message.to_payload()?, None)
            .await
    }

    /// Returns `true` when the link moved to `Connected`.
    pub fn on_connected(&mut self, member_id: &MemberId) -> bool {
        match self.links.get_mut(member_id) {
            Some(link) => link.mark_connected(),
            None => false,
        }
    }

    /// The engine reported the link as dead.
    pub async fn on_transport_closed(&mut self, member_id: &MemberId) {
        if let Some(link) = self.links.get_mut(member_id) {
            if link.state() != LinkState::Closed {
                info!("Transport to {} dropped", member_id);
                link.close().await;
            }
        }
    }

    pub async fn on_member_left(&mut self, member_id: &MemberId) {
        if let Some(link) = self.links.get_mut(member_id) {
            link.close().await;
        }
    }

    pub async fn send_file(
        &self,
        member_id: &MemberId,
        file_id: &FileId,
        data: Bytes,
    ) -> Result<(), RoomError> {
        let link = self
            .links
            .get(member_id)
            .ok_or_else(|| RoomError::UnknownPeer(member_id.clone()))?;
        let engine = match (link.state(), link.engine()) {
            (LinkState::Connected, Some(engine)) => engine,
            _ => return Err(RoomError::PeerNotConnected(member_id.clone())),
        };
        engine
            .send_file(file_id, data)
            .await
            .map_err(|e| RoomError::transport(member_id, e))
    }

    /// Closes every link and refuses new ones.
    pub async fn close_all(&mut self) {
        self.active = false;
        join_all(self.links.values_mut().map(|link| link.close())).await;
    }

    async fn open_link(&mut self, member_id: &MemberId, role: PeerRole) -> Result<(), RoomError> {
        let engine = self
            .factory
            .create(&self.local_id, member_id, role, self.events.clone())
            .await
            .map_err(|e| RoomError::transport(member_id, e))?;

        let mut link = PeerLink::new(member_id.clone(), role, engine);
        link.begin_signaling();
        info!("Opened {:?} link to {}", role, member_id);
        self.links.insert(member_id.clone(), link);

        if role == PeerRole::Responder {
            return Ok(());
        }

        let started = match self.links.get(member_id).and_then(PeerLink::engine) {
            Some(engine) => engine.start().await,
            None => Ok(()),
        };
        if let Err(e) = started {
            warn!("Failed to start negotiation with {}: {:#}", member_id, e);
            self.on_member_left(member_id).await;
            return Err(RoomError::transport(member_id, e));
        }
        Ok(())
    }
}

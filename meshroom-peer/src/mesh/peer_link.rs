use crate::transport::{PeerRole, TransportEngine};
use meshroom_core::MemberId;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Signaling,
    Connected,
    Closed,
}

/// Connection to one remote member plus its negotiation state.
pub struct PeerLink {
    member_id: MemberId,
    role: PeerRole,
    state: LinkState,
    engine: Option<Box<dyn TransportEngine>>,
}

impl PeerLink {
    pub(crate) fn new(member_id: MemberId, role: PeerRole, engine: Box<dyn TransportEngine>) -> Self {
        Self {
            member_id,
            role,
            state: LinkState::Idle,
            engine: Some(engine),
        }
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn engine(&self) -> Option<&dyn TransportEngine> {
        self.engine.as_deref()
    }

    pub(crate) fn begin_signaling(&mut self) {
        if self.state == LinkState::Idle {
            self.state = LinkState::Signaling;
        }
    }

    /// `Signaling -> Connected`. Returns whether the state changed.
    pub(crate) fn mark_connected(&mut self) -> bool {
        if self.state != LinkState::Signaling {
            return false;
        }
        self.state = LinkState::Connected;
        true
    }

    /// Releases the engine. Safe to call in any state.
    pub(crate) async fn close(&mut self) {
        self.state = LinkState::Closed;
        let Some(engine) = self.engine.take() else {
            return;
        };
        if let Err(e) = engine.close().await {
            warn!("Failed to close transport for {}: {:#}", self.member_id, e);
        }
    }
}

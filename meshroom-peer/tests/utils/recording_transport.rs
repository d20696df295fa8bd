use anyhow::Result;
use async_trait::async_trait;
use meshroom_core::MemberId;
use meshroom_peer::{
    LoopbackNetwork, LoopbackTransportFactory, PeerRole, TransportEngine, TransportEvent,
    TransportFactory,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type EventSenders = HashMap<(MemberId, MemberId), mpsc::UnboundedSender<TransportEvent>>;

/// Loopback transport that remembers every link it was asked to build and
/// can speak for any of their engines.
#[derive(Clone)]
pub struct RecordingTransportFactory {
    inner: LoopbackTransportFactory,
    created: Arc<Mutex<Vec<(MemberId, MemberId, PeerRole)>>>,
    senders: Arc<Mutex<EventSenders>>,
}

impl RecordingTransportFactory {
    pub fn new(network: LoopbackNetwork) -> Self {
        Self {
            inner: LoopbackTransportFactory::new(network),
            created: Arc::new(Mutex::new(Vec::new())),
            senders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delivers `event` to `local`'s session as if its engine for `remote`
    /// raised it. Returns `false` when no such engine was built.
    pub fn inject(&self, local: &MemberId, remote: &MemberId, event: TransportEvent) -> bool {
        let senders = self.senders.lock().unwrap();
        match senders.get(&(local.clone(), remote.clone())) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Links built by `local`, as `(remote, role)`.
    pub fn links_of(&self, local: &MemberId) -> Vec<(MemberId, PeerRole)> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| l == local)
            .map(|(_, remote, role)| (remote.clone(), *role))
            .collect()
    }
}

#[async_trait]
impl TransportFactory for RecordingTransportFactory {
    async fn create(
        &self,
        local: &MemberId,
        remote: &MemberId,
        role: PeerRole,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportEngine>> {
        self.created
            .lock()
            .unwrap()
            .push((local.clone(), remote.clone(), role));
        self.senders
            .lock()
            .unwrap()
            .insert((local.clone(), remote.clone()), events.clone());
        self.inner.create(local, remote, role, events).await
    }
}

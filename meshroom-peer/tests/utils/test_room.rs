use anyhow::Result;
use meshroom_core::{MemberId, MemberProfile, RoomId};
use meshroom_peer::{
    LocalRelay, LoopbackNetwork, RoomConfig, RoomCoordinator, RoomError, RoomHandle,
    RoomNotification,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::notification_helpers::{NOTIFICATION_TIMEOUT_MS, wait_for_notification};
use super::recording_transport::RecordingTransportFactory;

/// One joined member: its handle plus the notifications it received.
pub struct TestMember {
    pub name: String,
    pub handle: RoomHandle,
    pub events: mpsc::UnboundedReceiver<RoomNotification>,
}

impl TestMember {
    pub fn id(&self) -> MemberId {
        self.handle.member_id().clone()
    }

    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&RoomNotification) -> bool,
    ) -> Result<RoomNotification> {
        wait_for_notification(&mut self.events, predicate, NOTIFICATION_TIMEOUT_MS).await
    }

    pub async fn wait_connected_to(&mut self, other: &MemberId) -> Result<()> {
        self.wait_for(|n| matches!(n, RoomNotification::PeerConnected(id) if id == other))
            .await?;
        Ok(())
    }

    /// Waits until links to every member in `others` are up, in any order.
    pub async fn wait_connected_to_all(&mut self, others: &[MemberId]) -> Result<()> {
        let mut pending: HashSet<MemberId> = others.iter().cloned().collect();
        while !pending.is_empty() {
            let notification = self
                .wait_for(|n| matches!(n, RoomNotification::PeerConnected(id) if pending.contains(id)))
                .await?;
            if let RoomNotification::PeerConnected(id) = notification {
                pending.remove(&id);
            }
        }
        Ok(())
    }
}

/// A local relay and loopback network shared by every member of one room.
pub struct TestRoom {
    pub relay: LocalRelay,
    pub transport: RecordingTransportFactory,
    pub room_id: RoomId,
}

impl TestRoom {
    pub fn new() -> Self {
        Self {
            relay: LocalRelay::new(),
            transport: RecordingTransportFactory::new(LoopbackNetwork::new()),
            room_id: RoomId::from("test-room"),
        }
    }

    pub fn coordinator(&self, name: &str) -> RoomCoordinator {
        RoomCoordinator::new(
            Arc::new(self.relay.client(MemberProfile::new(name, name))),
            Arc::new(self.transport.clone()),
            RoomConfig::default(),
        )
    }

    pub async fn join(&self, name: &str) -> Result<TestMember, RoomError> {
        let (handle, events) = self.coordinator(name).join(self.room_id.clone()).await?;
        Ok(TestMember {
            name: name.to_owned(),
            handle,
            events,
        })
    }

    /// Joins `first` then `second` and waits until their link is up on both ends.
    pub async fn connected_pair(&self, first: &str, second: &str) -> Result<(TestMember, TestMember)> {
        let mut a = self.join(first).await?;
        let mut b = self.join(second).await?;
        b.wait_connected_to(&a.id()).await?;
        a.wait_connected_to(&b.id()).await?;
        Ok((a, b))
    }
}

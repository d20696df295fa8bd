use crate::error::RoomError;
use crate::relay::{RelayChannel, RelayClient, RelayEvent, RelaySubscription, embed_target};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use meshroom_core::{Member, MemberId, MemberProfile, RoomId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct LocalSubscriber {
    member: Member,
    bindings: Arc<DashSet<String>>,
    tx: mpsc::UnboundedSender<RelayEvent>,
}

struct LocalRelayInner {
    rooms: DashMap<RoomId, HashMap<MemberId, LocalSubscriber>>,
    rejected_handles: DashSet<String>,
    available: AtomicBool,
}

/// In-process presence relay.
///
/// Every subscriber has a single ordered queue, so events published on the
/// same name arrive in publish order. Senders do not receive their own
/// client events.
#[derive(Clone)]
pub struct LocalRelay {
    inner: Arc<LocalRelayInner>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LocalRelayInner {
                rooms: DashMap::new(),
                rejected_handles: DashSet::new(),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// A client authenticating as `profile`.
    pub fn client(&self, profile: MemberProfile) -> LocalRelayClient {
        LocalRelayClient {
            relay: self.clone(),
            profile,
        }
    }

    /// While unavailable, authentication, subscription and publishing fail.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Makes the auth hook refuse `handle`.
    pub fn reject_handle(&self, handle: impl Into<String>) {
        self.inner.rejected_handles.insert(handle.into());
    }

    pub fn members(&self, room: &RoomId) -> Vec<Member> {
        self.inner
            .rooms
            .get(room)
            .map(|subs| subs.values().map(|s| s.member.clone()).collect())
            .unwrap_or_default()
    }

    /// Drops every subscriber of `room`, closing their event streams.
    pub fn close_room(&self, room: &RoomId) {
        if self.inner.rooms.remove(room).is_some() {
            info!("Relay closed room {}", room);
        }
    }

    fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), RoomError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RoomError::ChannelUnavailable("relay unreachable".to_owned()))
        }
    }

    fn join(
        &self,
        room: &RoomId,
        member: Member,
        bindings: Arc<DashSet<String>>,
    ) -> RelaySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.inner.rooms.entry(room.clone()).or_default();

        for sub in subs.values() {
            if sub.member.id != member.id {
                let _ = sub.tx.send(RelayEvent::MemberAdded(member.clone()));
            }
        }

        subs.insert(
            member.id.clone(),
            LocalSubscriber {
                member: member.clone(),
                bindings,
                tx,
            },
        );
        let members = subs.values().map(|s| s.member.clone()).collect();

        RelaySubscription {
            members,
            events: rx,
        }
    }

    fn leave(&self, room: &RoomId, member_id: &MemberId) {
        let emptied = {
            let Some(mut subs) = self.inner.rooms.get_mut(room) else {
                return;
            };
            if subs.remove(member_id).is_none() {
                return;
            }
            for sub in subs.values() {
                let _ = sub.tx.send(RelayEvent::MemberRemoved(member_id.clone()));
            }
            subs.is_empty()
        };

        if emptied {
            self.inner.rooms.remove_if(room, |_, subs| subs.is_empty());
        }
    }

    fn deliver(
        &self,
        room: &RoomId,
        from: &MemberId,
        event: &str,
        payload: Value,
    ) -> Result<(), RoomError> {
        let Some(subs) = self.inner.rooms.get(room) else {
            return Err(RoomError::ChannelUnavailable(format!(
                "room {room} has no subscription"
            )));
        };
        if !subs.contains_key(from) {
            return Err(RoomError::ChannelUnavailable(format!(
                "{from} is not subscribed to {room}"
            )));
        }

        for sub in subs.values() {
            if &sub.member.id == from || !sub.bindings.contains(event) {
                continue;
            }
            let msg = RelayEvent::Message {
                event: event.to_owned(),
                from: Some(from.clone()),
                payload: payload.clone(),
            };
            if sub.tx.send(msg).is_err() {
                debug!("Subscriber {} stopped listening", sub.member.id);
            }
        }
        Ok(())
    }
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LocalRelayClient {
    relay: LocalRelay,
    profile: MemberProfile,
}

#[async_trait]
impl RelayClient for LocalRelayClient {
    async fn channel(&self, room: &RoomId) -> Result<Arc<dyn RelayChannel>, RoomError> {
        self.relay.ensure_available()?;

        if self.relay.inner.rejected_handles.contains(&self.profile.handle) {
            warn!("Relay auth rejected {}", self.profile.handle);
            return Err(RoomError::ChannelUnavailable(format!(
                "auth rejected for {}",
                self.profile.handle
            )));
        }

        let id = MemberId(Uuid::new_v4().to_string());
        Ok(Arc::new(LocalRelayChannel {
            relay: self.relay.clone(),
            room: room.clone(),
            me: Member::new(id, self.profile.clone()),
            bindings: Arc::new(DashSet::new()),
        }))
    }
}

pub struct LocalRelayChannel {
    relay: LocalRelay,
    room: RoomId,
    me: Member,
    bindings: Arc<DashSet<String>>,
}

#[async_trait]
impl RelayChannel for LocalRelayChannel {
    fn my_member_id(&self) -> MemberId {
        self.me.id.clone()
    }

    fn current_members(&self) -> Vec<Member> {
        self.relay.members(&self.room)
    }

    async fn bind(&self, event: &str) -> Result<(), RoomError> {
        self.bindings.insert(event.to_owned());
        Ok(())
    }

    async fn subscribe(&self) -> Result<RelaySubscription, RoomError> {
        self.relay.ensure_available()?;
        info!("{} subscribed to {}", self.me.id, self.room);
        Ok(self
            .relay
            .join(&self.room, self.me.clone(), self.bindings.clone()))
    }

    async fn publish(
        &self,
        event: &str,
        mut payload: Value,
        to: Option<&MemberId>,
    ) -> Result<(), RoomError> {
        self.relay.ensure_available()?;
        if let Some(to) = to {
            embed_target(&mut payload, to);
        }
        self.relay.deliver(&self.room, &self.me.id, event, payload)
    }

    async fn unsubscribe(&self) {
        self.relay.leave(&self.room, &self.me.id);
    }
}

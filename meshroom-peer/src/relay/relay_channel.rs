use crate::error::RoomError;
use async_trait::async_trait;
use meshroom_core::{Member, MemberId, RoomId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events delivered by a presence relay to one subscriber.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Presence: a member subscribed after us.
    MemberAdded(Member),

    /// Presence: a member unsubscribed or dropped.
    MemberRemoved(MemberId),

    /// Client event on a bound event name. `from` is stamped by the relay.
    Message {
        event: String,
        from: Option<MemberId>,
        payload: Value,
    },
}

/// Result of joining presence on a channel.
pub struct RelaySubscription {
    /// Members present at the moment we joined, ourselves included.
    /// Everyone arriving later shows up as [`RelayEvent::MemberAdded`].
    pub members: Vec<Member>,
    pub events: mpsc::UnboundedReceiver<RelayEvent>,
}

/// Entry point of the external relay service. Implemented for each relay
/// backend; authentication happens here.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Authenticates for `room` and returns a channel that is not yet subscribed.
    async fn channel(&self, room: &RoomId) -> Result<Arc<dyn RelayChannel>, RoomError>;
}

/// Thin pass-through over one relay channel.
///
/// `publish` is always a broadcast. When `to` is set it is only embedded as
/// `toId` in the payload, so receivers must filter on it themselves.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    fn my_member_id(&self) -> MemberId;

    /// Live view of the channel's members.
    fn current_members(&self) -> Vec<Member>;

    /// Registers interest in `event`. Bind before `subscribe` to not miss anything.
    async fn bind(&self, event: &str) -> Result<(), RoomError>;

    async fn subscribe(&self) -> Result<RelaySubscription, RoomError>;

    async fn publish(
        &self,
        event: &str,
        payload: Value,
        to: Option<&MemberId>,
    ) -> Result<(), RoomError>;

    /// Idempotent.
    async fn unsubscribe(&self);
}

/// Writes `toId` into an object payload. Non-object payloads are left alone.
pub fn embed_target(payload: &mut Value, to: &MemberId) {
    if let Value::Object(map) = payload {
        map.insert("toId".to_owned(), Value::String(to.to_string()));
    }
}

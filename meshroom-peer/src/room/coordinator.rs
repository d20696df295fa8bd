use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::relay::{RelayChannel, RelayClient, RelaySubscription};
use crate::room::{RoomHandle, RoomNotification, RoomSession};
use crate::transport::{TransportFactory, WebRtcTransportFactory};
use meshroom_core::protocol::signal_event_name;
use meshroom_core::{RoomId, RoomMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Joins rooms. Each successful join spawns an independent [`RoomSession`].
#[derive(Clone)]
pub struct RoomCoordinator {
    relay: Arc<dyn RelayClient>,
    transport: Arc<dyn TransportFactory>,
    config: RoomConfig,
}

impl RoomCoordinator {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        transport: Arc<dyn TransportFactory>,
        config: RoomConfig,
    ) -> Self {
        Self {
            relay,
            transport,
            config,
        }
    }

    /// Coordinator whose links are real WebRTC data channels.
    pub fn webrtc(relay: Arc<dyn RelayClient>, config: RoomConfig) -> Self {
        let transport = Arc::new(WebRtcTransportFactory::new(config.transport.clone()));
        Self::new(relay, transport, config)
    }

    /// Subscribes to `room_id` and starts its session.
    ///
    /// Fails with [`RoomError::ChannelUnavailable`] when the relay cannot be
    /// reached or rejects us; nothing is left subscribed in that case.
    pub async fn join(
        &self,
        room_id: RoomId,
    ) -> Result<(RoomHandle, mpsc::UnboundedReceiver<RoomNotification>), RoomError> {
        let channel = self.relay.channel(&room_id).await?;
        let member_id = channel.my_member_id();

        let subscription = match subscribe(channel.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Joining {} failed: {}", room_id, e);
                channel.unsubscribe().await;
                return Err(e);
            }
        };

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let session = RoomSession::new(
            room_id.clone(),
            channel,
            self.transport.clone(),
            command_rx,
            subscription.events,
            notify_tx,
        );
        tokio::spawn(session.run(subscription.members));

        info!("Joined room {} as {}", room_id, member_id);
        Ok((RoomHandle::new(room_id, member_id, command_tx), notify_rx))
    }
}

/// Binds every room event and our own signal event, then joins presence.
async fn subscribe(channel: &dyn RelayChannel) -> Result<RelaySubscription, RoomError> {
    for event in RoomMessage::room_event_names() {
        channel.bind(&event).await?;
    }
    channel.bind(&signal_event_name(&channel.my_member_id())).await?;
    channel.subscribe().await
}

use crate::transport::{
    PeerRole, TransportConfig, TransportEngine, TransportEvent, TransportFactory,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use meshroom_core::{FileId, MemberId, SignalData, TransferFrame};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const DATA_CHANNEL_LABEL: &str = "files";

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;
type IncomingFiles = Arc<Mutex<HashMap<FileId, IncomingFile>>>;

/// A file being reassembled. `size` is what the sender announced in `Start`.
struct IncomingFile {
    size: u64,
    buf: BytesMut,
}

/// Only `Failed` is final. `Disconnected` may recover on its own, and
/// `Closed` follows our own close(), which the mesh already knows about.
fn is_link_lost(state: RTCPeerConnectionState) -> bool {
    state == RTCPeerConnectionState::Failed
}

/// Builds [`WebRtcEngine`]s from a shared [`TransportConfig`].
#[derive(Clone, Default)]
pub struct WebRtcTransportFactory {
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        _local: &MemberId,
        remote: &MemberId,
        role: PeerRole,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportEngine>> {
        let engine = WebRtcEngine::new(remote.clone(), role, self.config.clone(), events).await?;
        Ok(Box::new(engine))
    }
}

/// Peer connection with one reliable data channel carrying file transfers.
pub struct WebRtcEngine {
    member_id: MemberId,
    role: PeerRole,
    chunk_size: usize,
    max_file_size: u64,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: ChannelSlot,
    incoming: IncomingFiles,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WebRtcEngine {
    pub async fn new(
        member_id: MemberId,
        role: PeerRole,
        config: TransportConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let data_channel: ChannelSlot = Arc::new(Mutex::new(None));
        let incoming: IncomingFiles = Arc::new(Mutex::new(HashMap::new()));

        let state_tx = events.clone();
        let uid_state = member_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", uid, s);
                    if is_link_lost(s) {
                        let _ = tx.send(TransportEvent::Disconnected(uid));
                    }
                })
            },
        ));

        let ice_tx = events.clone();
        let uid_ice = member_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        warn!("Skipping local ICE candidate for {}: {}", uid, e);
                        return;
                    }
                };
                let _ = tx.send(TransportEvent::Signal(
                    uid,
                    SignalData::IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                    },
                ));
            })
        }));

        let dc_tx = events.clone();
        let uid_dc = member_id.clone();
        let dc_slot = data_channel.clone();
        let dc_incoming = incoming.clone();
        let max_file_size = config.max_file_size;
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let uid = uid_dc.clone();
            let slot = dc_slot.clone();
            let incoming = dc_incoming.clone();

            Box::pin(async move {
                debug!("Remote data channel '{}' from {}", dc.label(), uid);
                Self::setup_data_channel(uid, dc, slot, incoming, max_file_size, tx);
            })
        }));

        Ok(Self {
            member_id,
            role,
            chunk_size: config.chunk_size,
            max_file_size,
            peer_connection,
            data_channel,
            incoming,
            events,
        })
    }

    fn setup_data_channel(
        member_id: MemberId,
        dc: Arc<RTCDataChannel>,
        slot: ChannelSlot,
        incoming: IncomingFiles,
        max_file_size: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        let open_dc = dc.clone();
        let open_tx = events.clone();
        let open_uid = member_id.clone();
        dc.on_open(Box::new(move || {
            let channel_ready = open_dc.clone();
            let slot = slot.clone();
            let tx = open_tx.clone();
            let uid = open_uid.clone();

            Box::pin(async move {
                info!("Data channel to {} is open", uid);
                *slot.lock().await = Some(channel_ready);
                let _ = tx.send(TransportEvent::Connected(uid));
            })
        }));

        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let tx = events.clone();
            let uid = member_id.clone();
            let incoming = incoming.clone();

            Box::pin(async move {
                let frame = match TransferFrame::decode(&msg.data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Dropping data channel message from {}: {}", uid, e);
                        return;
                    }
                };
                Self::on_frame(uid, frame, &incoming, max_file_size, &tx).await;
            })
        }));
    }

    /// Reassembles incoming files. The sender is not trusted: oversized
    /// announcements, overflowing chunks and short transfers are dropped.
    async fn on_frame(
        member_id: MemberId,
        frame: TransferFrame,
        incoming: &IncomingFiles,
        max_file_size: u64,
        events: &mpsc::UnboundedSender<TransportEvent>,
    ) {
        let mut files = incoming.lock().await;
        match frame {
            TransferFrame::Start { file_id, size } => {
                if size > max_file_size {
                    warn!(
                        "Refusing {} from {}: {} bytes is over the {} byte limit",
                        file_id, member_id, size, max_file_size
                    );
                    files.remove(&file_id);
                    return;
                }
                files.insert(
                    file_id.clone(),
                    IncomingFile {
                        size,
                        buf: BytesMut::new(),
                    },
                );
                let _ = events.send(TransportEvent::TransferStarted(member_id, file_id));
            }
            TransferFrame::Chunk { file_id, data } => {
                let Some(file) = files.get_mut(&file_id) else {
                    warn!("Chunk for unannounced file {} from {}", file_id, member_id);
                    return;
                };
                if file.buf.len() as u64 + data.len() as u64 > file.size {
                    warn!(
                        "Dropping {} from {}: more than the announced {} bytes",
                        file_id, member_id, file.size
                    );
                    files.remove(&file_id);
                    return;
                }
                file.buf.extend_from_slice(&data);
            }
            TransferFrame::End { file_id } => {
                let Some(file) = files.remove(&file_id) else {
                    warn!("End of unannounced file {} from {}", file_id, member_id);
                    return;
                };
                if file.buf.len() as u64 != file.size {
                    warn!(
                        "Dropping {} from {}: got {} of {} bytes",
                        file_id,
                        member_id,
                        file.buf.len(),
                        file.size
                    );
                    return;
                }
                let _ = events.send(TransportEvent::TransferFinished(
                    member_id,
                    file_id,
                    file.buf.freeze(),
                ));
            }
        }
    }

    fn emit(&self, event: TransportEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("room session for {} is gone", self.member_id))
    }

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<()> {
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, init: RTCIceCandidateInit) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }
}

#[async_trait]
impl TransportEngine for WebRtcEngine {
    async fn start(&self) -> Result<()> {
        if self.role == PeerRole::Responder {
            return Ok(());
        }

        let dc = self
            .peer_connection
            .create_data_channel(DATA_CHANNEL_LABEL, None)
            .await?;
        Self::setup_data_channel(
            self.member_id.clone(),
            dc,
            self.data_channel.clone(),
            self.incoming.clone(),
            self.max_file_size,
            self.events.clone(),
        );

        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;

        info!("Sending offer to {}", self.member_id);
        self.emit(TransportEvent::Signal(
            self.member_id.clone(),
            SignalData::Offer { sdp: offer.sdp },
        ))
    }

    async fn accept_signal(&self, data: SignalData) -> Result<()> {
        match data {
            SignalData::Offer { sdp } => {
                self.set_remote_description(RTCSessionDescription::offer(sdp)?)
                    .await?;
                let answer = self.peer_connection.create_answer(None).await?;
                self.peer_connection
                    .set_local_description(answer.clone())
                    .await?;
                self.emit(TransportEvent::Signal(
                    self.member_id.clone(),
                    SignalData::Answer { sdp: answer.sdp },
                ))
            }
            SignalData::Answer { sdp } => {
                self.set_remote_description(RTCSessionDescription::answer(sdp)?)
                    .await
            }
            SignalData::IceCandidate {
                candidate,
                sdp_mid,
                sdp_m_line_index,
            } => {
                self.add_ice_candidate(RTCIceCandidateInit {
                    candidate,
                    sdp_mid,
                    sdp_mline_index: sdp_m_line_index,
                    ..Default::default()
                })
                .await
            }
        }
    }

    async fn send_file(&self, file_id: &FileId, data: Bytes) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("data channel to {} is not open", self.member_id))?;

        for frame in TransferFrame::split(file_id, &data, self.chunk_size) {
            let bytes = Bytes::from(frame.encode()?);
            dc.send(&bytes).await?;
        }
        debug!("Sent {} ({} bytes) to {}", file_id, data.len(), self.member_id);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

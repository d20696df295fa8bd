use crate::directory::MemberDirectory;
use crate::error::{RegistryError, RoomError};
use crate::mesh::PeerMesh;
use crate::registry::{OfferMetadata, SharedFileRegistry};
use crate::relay::{RelayChannel, RelayEvent};
use crate::room::{RoomCommand, RoomNotification, RoomSnapshot};
use crate::transport::{PeerRole, TransportEvent, TransportFactory};
use bytes::Bytes;
use meshroom_core::protocol::{
    DownloadReceipt, FileAnnouncement, FileRevocation, LeaveNotice, SharedFilesRequest,
    UploadRequest,
};
use meshroom_core::{
    FileId, FileStatus, LocalFile, Member, MemberId, RoomId, RoomMessage, SignalData,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One joined room. Owns the directory, mesh and registry and is the only
/// place that mutates them; every input arrives through one of three queues.
pub struct RoomSession {
    room_id: RoomId,
    local_id: MemberId,
    relay: Arc<dyn RelayChannel>,
    directory: MemberDirectory,
    mesh: PeerMesh,
    registry: SharedFileRegistry,
    command_rx: mpsc::Receiver<RoomCommand>,
    relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    notify_tx: mpsc::UnboundedSender<RoomNotification>,
    left: bool,
}

impl RoomSession {
    pub fn new(
        room_id: RoomId,
        relay: Arc<dyn RelayChannel>,
        transport: Arc<dyn TransportFactory>,
        command_rx: mpsc::Receiver<RoomCommand>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        notify_tx: mpsc::UnboundedSender<RoomNotification>,
    ) -> Self {
        let local_id = relay.my_member_id();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        Self {
            room_id,
            directory: MemberDirectory::new(local_id.clone()),
            mesh: PeerMesh::new(local_id.clone(), transport, relay.clone(), transport_tx),
            registry: SharedFileRegistry::new(local_id.clone()),
            local_id,
            relay,
            command_rx,
            relay_rx,
            transport_rx,
            notify_tx,
            left: false,
        }
    }

    /// Drives the session until it leaves. `members` is the presence snapshot
    /// taken when the subscription was made.
    pub async fn run(mut self, members: Vec<Member>) {
        info!("Room {} session started as {}", self.room_id, self.local_id);
        self.enter(members).await;

        while !self.left {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All room handles dropped. Leaving {}.", self.room_id);
                            self.leave().await;
                        }
                    }
                }

                evt = self.relay_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_relay_event(e).await,
                        None => {
                            warn!("Relay closed the channel for {}", self.room_id);
                            self.leave().await;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        info!("Room {} session finished", self.room_id);
    }

    /// Registers everyone already present and asks them for their offers.
    /// Members that were here first open the links to us.
    async fn enter(&mut self, members: Vec<Member>) {
        for member in members {
            let id = member.id.clone();
            if !self.directory.on_member_joined(member.clone()) {
                continue;
            }
            self.notify(RoomNotification::MemberJoined(member));

            if let Err(e) = self.mesh.on_member_joined(&id, PeerRole::Responder).await {
                warn!("Could not prepare link to {}: {}", id, e);
            }

            let request = RoomMessage::SendSharedFiles(SharedFilesRequest { to_id: id.clone() });
            if let Err(e) = self.publish(&request).await {
                warn!("Failed to ask {} for shared files: {}", id, e);
            }
        }
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::ShareFiles { files, reply } => {
                let _ = reply.send(self.share_files(files).await);
            }

            RoomCommand::RemoveSharedFile { id, reply } => {
                let _ = reply.send(self.remove_shared_file(id).await);
            }

            RoomCommand::RequestDownload { id, reply } => {
                let _ = reply.send(self.request_download(id).await);
            }

            RoomCommand::RequestSharedFiles { member_id, reply } => {
                let result = if self.directory.contains(&member_id) {
                    let request = RoomMessage::SendSharedFiles(SharedFilesRequest { to_id: member_id });
                    self.publish(&request).await
                } else {
                    Err(RoomError::UnknownPeer(member_id))
                };
                let _ = reply.send(result);
            }

            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(RoomSnapshot {
                    member_id: self.local_id.clone(),
                    members: self.directory.members(),
                    links: self.mesh.links(),
                    local_offers: self.registry.list_local_offers(),
                    shared_with_me: self.registry.list_shared_with_me(),
                });
            }

            RoomCommand::Leave { reply } => {
                self.leave().await;
                let _ = reply.send(());
            }
        }
    }

    async fn share_files(&mut self, files: Vec<LocalFile>) -> Result<Vec<FileId>, RoomError> {
        let mut ids = Vec::with_capacity(files.len());

        for file in files {
            let name = file.name.clone();
            let size = file.size();
            let id = self.registry.offer(file);

            let announcement = RoomMessage::AddSharedWithMeFile(FileAnnouncement {
                share_id: id.clone(),
                name: name.clone(),
                size,
                owner: self.local_id.clone(),
                show_notification: true,
                to_id: None,
            });
            if let Err(e) = self.publish(&announcement).await {
                self.registry.revoke(&id);
                return Err(e);
            }

            info!("Sharing {} ({} bytes) as {}", name, size, id);
            ids.push(id);
        }

        Ok(ids)
    }

    async fn remove_shared_file(&mut self, id: FileId) -> Result<(), RoomError> {
        if self.registry.revoke(&id).is_none() {
            return Err(RegistryError::UnknownFile(id).into());
        }
        self.publish(&RoomMessage::RemoveSharedWithMeFile(FileRevocation { id }))
            .await
    }

    async fn request_download(&mut self, id: FileId) -> Result<(), RoomError> {
        let file = self
            .registry
            .shared_with_me(&id)
            .ok_or_else(|| RegistryError::UnknownFile(id.clone()))?;

        if file.status != FileStatus::ToDownload {
            return Err(RegistryError::InvalidTransition {
                id,
                from: file.status,
                to: FileStatus::Downloading,
            }
            .into());
        }

        let request = RoomMessage::UploadSharedFile(UploadRequest {
            to_id: file.owner.clone(),
            file_id: id.clone(),
        });
        self.publish(&request).await?;
        self.registry.begin_download(&id)?;
        Ok(())
    }

    async fn handle_relay_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::MemberAdded(member) => {
                let id = member.id.clone();
                if !self.directory.on_member_joined(member.clone()) {
                    return;
                }
                info!("{} joined {}", id, self.room_id);
                self.notify(RoomNotification::MemberJoined(member));

                if let Err(e) = self.mesh.on_member_joined(&id, PeerRole::Initiator).await {
                    warn!("Could not open link to {}: {}", id, e);
                }
            }

            RelayEvent::MemberRemoved(id) => self.on_member_left(&id).await,

            RelayEvent::Message {
                event,
                from,
                payload,
            } => self.handle_message(&event, from, payload).await,
        }
    }

    async fn handle_message(&mut self, event: &str, from: Option<MemberId>, payload: Value) {
        if from.as_ref() == Some(&self.local_id) {
            return;
        }

        let message = match RoomMessage::decode(event, payload) {
            Ok(m) => m,
            Err(e) => {
                warn!("Dropping message from {:?}: {}", from, e);
                return;
            }
        };

        if let Some(to) = message.addressed_to() {
            if to != &self.local_id {
                return;
            }
        }

        match message {
            RoomMessage::AddSharedWithMeFile(announcement) => {
                let owner = from.unwrap_or_else(|| announcement.owner.clone());
                if owner == self.local_id {
                    return;
                }
                let file = self
                    .registry
                    .record_offer(
                        announcement.share_id,
                        OfferMetadata {
                            name: announcement.name,
                            size: announcement.size,
                        },
                        owner,
                    )
                    .clone();
                debug!("{} offered {} ({})", file.owner, file.name, file.id);
                self.notify(RoomNotification::FileOffered {
                    file,
                    show_notification: announcement.show_notification,
                });
            }

            RoomMessage::RemoveSharedWithMeFile(revocation) => {
                if self.registry.record_revocation(&revocation.id).is_some() {
                    self.notify(RoomNotification::FileRevoked(revocation.id));
                }
            }

            RoomMessage::SendSharedFiles(_) => {
                let Some(requester) = self.known_sender(from) else {
                    return;
                };
                for file in self.registry.list_local_offers() {
                    let announcement = RoomMessage::AddSharedWithMeFile(FileAnnouncement {
                        share_id: file.id,
                        name: file.name,
                        size: file.size,
                        owner: self.local_id.clone(),
                        show_notification: false,
                        to_id: Some(requester.clone()),
                    });
                    if let Err(e) = self.publish(&announcement).await {
                        warn!("Failed to re-announce files to {}: {}", requester, e);
                        return;
                    }
                }
            }

            RoomMessage::UploadSharedFile(request) => {
                let Some(requester) = self.known_sender(from) else {
                    return;
                };
                let Some(file) = self.registry.local_offer(&request.file_id) else {
                    warn!("{} asked for {}, which we do not offer", requester, request.file_id);
                    return;
                };
                let data = file.data.clone();

                match self.mesh.send_file(&requester, &request.file_id, data).await {
                    Ok(()) => self.notify(RoomNotification::UploadStarted {
                        file_id: request.file_id,
                        to: requester,
                    }),
                    Err(e) => error!("Upload of {} to {} failed: {}", request.file_id, requester, e),
                }
            }

            RoomMessage::FinishedDownloading(receipt) => {
                let Some(by) = self.known_sender(from) else {
                    return;
                };
                if self.registry.local_offer(&receipt.file_id).is_none() {
                    return;
                }
                match self.registry.complete_download(&receipt.file_id, &by) {
                    Ok(()) => self.notify(RoomNotification::DownloadFinished {
                        file_id: receipt.file_id,
                        by,
                    }),
                    Err(e) => warn!("Ignoring download receipt from {}: {}", by, e),
                }
            }

            RoomMessage::LeaveRoom(_) => {
                if let Some(member) = from {
                    self.on_member_left(&member).await;
                }
            }

            RoomMessage::Signal { to, envelope } => {
                if to != self.local_id {
                    return;
                }
                let sender = from.unwrap_or(envelope.user_id);
                if sender == self.local_id {
                    return;
                }
                self.on_signal(&sender, envelope.data).await;
            }
        }
    }

    async fn on_signal(&mut self, from: &MemberId, data: SignalData) {
        if let Err(e) = self.mesh.on_signal_received(from, data).await {
            warn!("Signal from {} failed: {}", from, e);
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Signal(to, data) => {
                if let Err(e) = self.mesh.relay_signal(&to, data).await {
                    warn!("Failed to relay signal to {}: {}", to, e);
                }
            }

            TransportEvent::Connected(member) => {
                if self.mesh.on_connected(&member) {
                    info!("Link to {} connected", member);
                    self.notify(RoomNotification::PeerConnected(member));
                }
            }

            TransportEvent::Disconnected(member) => self.mesh.on_transport_closed(&member).await,

            TransportEvent::TransferStarted(from, file_id) => {
                debug!("Receiving {} from {}", file_id, from);
                let pending = self
                    .registry
                    .shared_with_me(&file_id)
                    .is_some_and(|f| f.status == FileStatus::ToDownload);
                if pending {
                    let _ = self.registry.begin_download(&file_id);
                }
            }

            TransportEvent::TransferFinished(from, file_id, data) => {
                self.on_transfer_finished(&from, file_id, data).await;
            }
        }
    }

    async fn on_transfer_finished(&mut self, from: &MemberId, file_id: FileId, data: Bytes) {
        let Some(file) = self.registry.shared_with_me(&file_id) else {
            warn!("Discarding {} from {}: no longer offered", file_id, from);
            return;
        };
        let name = file.name.clone();
        if file.status == FileStatus::ToDownload {
            let _ = self.registry.begin_download(&file_id);
        }

        let me = self.local_id.clone();
        if let Err(e) = self.registry.complete_download(&file_id, &me) {
            warn!("Discarding {} from {}: {}", file_id, from, e);
            return;
        }

        info!("Received {} ({} bytes) from {}", name, data.len(), from);
        self.notify(RoomNotification::FileReceived {
            file_id: file_id.clone(),
            name,
            data,
        });

        let receipt = RoomMessage::FinishedDownloading(DownloadReceipt { file_id });
        if let Err(e) = self.publish(&receipt).await {
            warn!("Failed to confirm download to {}: {}", from, e);
        }
    }

    async fn on_member_left(&mut self, member_id: &MemberId) {
        let known = self.directory.on_member_left(member_id).is_some();
        self.mesh.on_member_left(member_id).await;

        for id in self.registry.forget_member(member_id) {
            self.notify(RoomNotification::FileRevoked(id));
        }
        if known {
            info!("{} left {}", member_id, self.room_id);
            self.notify(RoomNotification::MemberLeft(member_id.clone()));
        }
    }

    /// Safe to call at any point. Does not rely on the relay echoing our own
    /// leave notice back.
    async fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;

        if let Err(e) = self.publish(&RoomMessage::LeaveRoom(LeaveNotice {})).await {
            debug!("Leave notice not delivered: {}", e);
        }
        self.relay.unsubscribe().await;
        self.mesh.close_all().await;
        self.registry.clear_remote();

        info!("Left room {}", self.room_id);
        self.notify(RoomNotification::LeftRoom);
    }

    /// Sender of a request that must come from a member we know.
    fn known_sender(&self, from: Option<MemberId>) -> Option<MemberId> {
        let member = from?;
        if self.directory.contains(&member) {
            Some(member)
        } else {
            debug!("{}", RoomError::UnknownPeer(member));
            None
        }
    }

    async fn publish(&self, message: &RoomMessage) -> Result<(), RoomError> {
        self.relay
            .publish(&message.event_name(), message.to_payload()?, message.addressed_to())
            .await
    }

    fn notify(&self, notification: RoomNotification) {
        if self.notify_tx.send(notification).is_err() {
            debug!("Notification receiver for {} dropped", self.room_id);
        }
    }
}

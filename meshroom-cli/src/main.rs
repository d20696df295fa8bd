use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use meshroom::model::{LocalFile, MemberProfile, RoomId};
use meshroom::peer::{
    LocalRelay, LoopbackNetwork, LoopbackTransportFactory, RoomConfig, RoomCoordinator,
    RoomHandle, RoomNotification, TransportFactory, WebRtcTransportFactory,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STEP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "meshroom")]
#[command(about = "Peer-to-peer file sharing rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs two members in one process: the first shares a file, the second downloads it.
    Demo {
        #[arg(long, default_value = "lobby")]
        room: String,

        #[arg(long, value_enum, default_value_t = TransportKind::Loopback)]
        transport: TransportKind,

        /// File to share. A short greeting is shared when omitted.
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, default_value = "alice")]
        name: String,

        #[arg(long, default_value = "bob")]
        peer: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportKind {
    Loopback,
    Webrtc,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::Demo {
            room,
            transport,
            file,
            name,
            peer,
        } => run_demo(RoomId::new(room), transport, file, name, peer).await,
    }
}

async fn run_demo(
    room_id: RoomId,
    transport: TransportKind,
    file: Option<PathBuf>,
    name: String,
    peer: String,
) -> Result<()> {
    println!("{}", format!("🚪 Opening room {room_id}...").green().bold());

    let config = RoomConfig::from_env();
    let factory: Arc<dyn TransportFactory> = match transport {
        TransportKind::Loopback => Arc::new(LoopbackTransportFactory::new(LoopbackNetwork::new())),
        TransportKind::Webrtc => Arc::new(WebRtcTransportFactory::new(config.transport.clone())),
    };
    let relay = LocalRelay::new();

    let join = |username: &str| {
        let client = Arc::new(relay.client(MemberProfile::new(username, username)));
        let coordinator = RoomCoordinator::new(client, factory.clone(), config.clone());
        let room_id = room_id.clone();
        async move { coordinator.join(room_id).await }
    };

    let (sharer, mut sharer_events) = join(name.as_str()).await.context("sharer could not join")?;
    let (receiver, mut receiver_events) = join(peer.as_str()).await.context("receiver could not join")?;

    info!("{} and {} joined {}", sharer.member_id(), receiver.member_id(), room_id);

    let shared = load_file(file).await?;
    let size = shared.size();

    wait_for(&mut receiver_events, &peer, |n| {
        matches!(n, RoomNotification::PeerConnected(id) if id == sharer.member_id())
    })
    .await?;
    wait_for(&mut sharer_events, &name, |n| {
        matches!(n, RoomNotification::PeerConnected(id) if id == receiver.member_id())
    })
    .await?;
    info!("Link between {name} and {peer} is up");

    let ids = sharer.share_files(vec![shared]).await?;
    let Some(file_id) = ids.into_iter().next() else {
        bail!("nothing was shared");
    };
    println!("{}", format!("📦 {name} shares {file_id} ({size} bytes)").cyan());

    wait_for(&mut receiver_events, &peer, |n| {
        matches!(n, RoomNotification::FileOffered { file, .. } if file.id == file_id)
    })
    .await?;

    receiver.request_download(file_id.clone()).await?;
    info!("{peer} requested {file_id}");

    let received = wait_for(&mut receiver_events, &peer, |n| {
        matches!(n, RoomNotification::FileReceived { file_id: id, .. } if *id == file_id)
    })
    .await?;
    wait_for(&mut sharer_events, &name, |n| {
        matches!(n, RoomNotification::DownloadFinished { file_id: id, .. } if *id == file_id)
    })
    .await?;

    if let RoomNotification::FileReceived { name: file_name, data, .. } = received {
        println!(
            "{}",
            format!("✨ {peer} received {file_name} ({} bytes)", data.len())
                .green()
                .bold()
        );
    }

    leave(&receiver, &peer).await;
    leave(&sharer, &name).await;
    Ok(())
}

async fn load_file(path: Option<PathBuf>) -> Result<LocalFile> {
    let Some(path) = path else {
        return Ok(LocalFile::new("hello.txt", Bytes::from_static(b"hello from meshroom\n")));
    };

    debug!("Loading {}", path.display());
    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shared.bin".to_owned());
    Ok(LocalFile::new(name, data))
}

/// Prints notifications for `who` until one matches.
async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<RoomNotification>,
    who: &str,
    mut predicate: impl FnMut(&RoomNotification) -> bool,
) -> Result<RoomNotification> {
    let found = tokio::time::timeout(STEP_TIMEOUT, async {
        while let Some(notification) = events.recv().await {
            print_notification(who, &notification);
            if predicate(&notification) {
                return Some(notification);
            }
        }
        None
    })
    .await
    .with_context(|| format!("{who} timed out waiting for the room"))?;

    found.with_context(|| format!("{who}'s session ended early"))
}

async fn leave(handle: &RoomHandle, who: &str) {
    handle.leave().await;
    println!("{}", format!("👋 {who} left {}", handle.room_id()).yellow());
}

fn print_notification(who: &str, notification: &RoomNotification) {
    let line = match notification {
        RoomNotification::MemberJoined(member) => format!("{} joined", member.username),
        RoomNotification::MemberLeft(id) => format!("{id} left"),
        RoomNotification::PeerConnected(id) => format!("connected to {id}"),
        RoomNotification::FileOffered { file, .. } => {
            format!("{} offers {} ({} bytes)", file.owner, file.name, file.size)
        }
        RoomNotification::FileRevoked(id) => format!("{id} revoked"),
        RoomNotification::UploadStarted { file_id, to } => format!("sending {file_id} to {to}"),
        RoomNotification::DownloadFinished { file_id, by } => format!("{by} downloaded {file_id}"),
        RoomNotification::FileReceived { name, data, .. } => {
            format!("received {name} ({} bytes)", data.len())
        }
        RoomNotification::LeftRoom => "left the room".to_owned(),
    };
    println!("   {} {}", format!("[{who}]").dimmed(), line);
}

//! Two sessions over the simulated network: one shares, the other downloads.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use duet_files::{DownloadDir, SharedFile};
use duet_net::sim::SimNetwork;
use duet_session::{Session, SessionConfig, SessionEvent};

use crate::settings::Settings;

/// Size of the generated file when no paths are given.
const SAMPLE_FILE_SIZE: usize = 150_000;

/// Upper bound on the whole exchange.
const DEMO_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Files to share; a generated sample is used when empty.
    pub files: Vec<PathBuf>,
    pub download_dir: PathBuf,
    /// One-way latency of the simulated link.
    pub latency: Duration,
}

impl DemoOptions {
    pub fn from_settings(settings: &Settings, files: Vec<PathBuf>) -> Self {
        Self {
            files,
            download_dir: settings.download_dir.clone(),
            latency: Duration::from_millis(20),
        }
    }
}

/// Run the exchange and return the paths the downloads were saved to.
pub async fn run(settings: &Settings, options: DemoOptions) -> Result<Vec<PathBuf>> {
    tokio::time::timeout(DEMO_TIMEOUT, exchange(settings, options))
        .await
        .context("demo timed out")?
}

async fn load_files(paths: &[PathBuf]) -> Result<Vec<SharedFile>> {
    if paths.is_empty() {
        let data: Vec<u8> = (0..SAMPLE_FILE_SIZE).map(|i| (i % 251) as u8).collect();
        return Ok(vec![SharedFile::new("sample.bin", data)]);
    }
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(SharedFile::from_path(path).await?);
    }
    Ok(files)
}

fn start(net: &SimNetwork, name: &str, config: SessionConfig) -> Result<Session> {
    let peer = net.create_peer(name)?;
    let (transport, events) = peer.into_parts();
    Session::start(Arc::new(transport), events, config)
        .with_context(|| format!("failed to start session {name}"))
}

async fn exchange(settings: &Settings, options: DemoOptions) -> Result<Vec<PathBuf>> {
    let files = load_files(&options.files).await?;
    let download_dir = DownloadDir::open(options.download_dir.clone()).await?;

    let net = SimNetwork::new();
    net.set_latency(options.latency);

    let sharer_config = SessionConfig {
        display_name: format!("{}-sharer", settings.display_name),
        ..settings.session_config()
    };
    let sharer = start(&net, "sharer", sharer_config)?;
    let mut downloader = start(&net, "downloader", settings.session_config())?;
    let sharer_id = sharer.local_id().clone();

    tracing::info!(files = files.len(), latency = ?options.latency, "demo starting");
    sharer.begin_sharing(files)?;
    downloader.connect_to_peer(&sharer_id)?;

    let manifest = loop {
        match downloader.recv_event().await {
            Some(SessionEvent::PeerManifest { files, .. }) => break files,
            Some(SessionEvent::HandshakeFailed { error, .. }) => bail!("handshake failed: {error}"),
            Some(event) => tracing::debug!(?event, "waiting for manifest"),
            None => bail!("downloader session stopped"),
        }
    };

    let mut pending = BTreeSet::new();
    for entry in &manifest {
        tracing::info!(file_name = %entry.name, file_size = entry.size, "requesting");
        downloader.request_file(&entry.id).await?;
        pending.insert(entry.id.clone());
    }

    let mut saved = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        match downloader.recv_event().await {
            Some(SessionEvent::Progress {
                file_id, percent, ..
            }) => {
                tracing::info!(file_id = %file_id, percent, "download progress");
            }
            Some(SessionEvent::FileReceived { file, .. }) => {
                pending.remove(&file.file_id);
                saved.push(download_dir.save(&file.name, &file.data).await?);
            }
            Some(SessionEvent::TransferFailed { file_id, error, .. }) => {
                bail!("transfer of {file_id} failed: {error}")
            }
            Some(SessionEvent::TransferAbandoned { file_id, .. }) => {
                bail!("transfer of {file_id} was abandoned")
            }
            Some(_) => {}
            None => bail!("downloader session stopped"),
        }
    }

    downloader.remove_peer(&sharer_id)?;
    tokio::time::sleep(settings.session_config().teardown_grace).await;
    downloader.shutdown();
    sharer.shutdown();

    tracing::info!(saved = saved.len(), dir = %download_dir.root().display(), "demo complete");
    Ok(saved)
}

/// Print a one-line summary per saved file.
pub fn report(paths: &[PathBuf]) {
    for path in paths {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!("{} ({size} bytes)", path.display());
    }
}

//! The session actor: one task per local identity owning every peer session.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use duet_crypto::CryptoError;
use duet_files::{ChunkOutcome, CompletedFile, FileReceiver, FileSender, SharedFile, SharedFiles};
use duet_net::{LinkEvent, LinkRole, Transport};
use duet_protocol::{
    decode_message, encode_message, FileChunk, FileId, FileMetadata, Message, PeerId,
    SharedFileEntry,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, RwLock};

use crate::handshake::{Handshake, HandshakeError, HandshakeStep, LocalIdentity};
use crate::registry::{ConnectionStatus, PeerRegistry};

/// Pause between consecutive chunk sends.
const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Time a removed peer has to receive our `Disconnected` before the link closes.
const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_millis(100);

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name sent in `Hello`.
    pub display_name: String,
    pub chunk_delay: Duration,
    pub teardown_grace: Duration,
    /// Require both sides to answer a challenge before reporting `Connected`.
    pub mutual_auth: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "duet".to_string(),
            chunk_delay: DEFAULT_CHUNK_DELAY,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            mutual_auth: true,
        }
    }
}

/// Events emitted by the session to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StatusChanged {
        peer: PeerId,
        status: ConnectionStatus,
    },
    /// A peer announced (or re-announced) the files it shares.
    PeerManifest {
        peer: PeerId,
        files: Vec<SharedFileEntry>,
    },
    /// Download progress, 0 to 100.
    Progress {
        peer: PeerId,
        file_id: FileId,
        percent: u8,
    },
    FileReceived {
        peer: PeerId,
        file: CompletedFile,
    },
    TransferFailed {
        peer: PeerId,
        file_id: FileId,
        error: String,
    },
    /// A partial download was discarded because its peer went away.
    TransferAbandoned {
        peer: PeerId,
        file_id: FileId,
    },
    HandshakeFailed {
        peer: PeerId,
        error: String,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to initialise session keys: {0}")]
    Crypto(#[from] CryptoError),

    #[error("session has shut down")]
    Closed,

    #[error("no connected peer offers file {0}")]
    NoPeerHasFile(FileId),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// State readable from outside the actor.
#[derive(Debug, Default)]
struct SessionView {
    statuses: BTreeMap<PeerId, ConnectionStatus>,
    local_manifest: Vec<SharedFileEntry>,
    remote_manifests: BTreeMap<PeerId, Vec<SharedFileEntry>>,
    progress: BTreeMap<(PeerId, FileId), u8>,
}

enum Command {
    Share(Vec<SharedFile>),
    AddFile(SharedFile),
    RemoveFile(FileId),
    RequestFile {
        file_id: FileId,
        reply: oneshot::Sender<Result<PeerId, SessionError>>,
    },
    RemovePeer(PeerId),
    /// Close the link to `peer` and drop its state, unless it has since
    /// reconnected under a newer generation.
    Teardown { peer: PeerId, generation: u64 },
}

/// Handle to a running session actor.
///
/// Dropping the handle shuts the actor down.
pub struct Session {
    local_id: PeerId,
    transport: Arc<dyn Transport>,
    view: Arc<RwLock<SessionView>>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Session {
    /// Generate fresh key pairs and spawn the actor over `transport`.
    ///
    /// `link_events` must be the event stream belonging to `transport`.
    pub fn start(
        transport: Arc<dyn Transport>,
        link_events: mpsc::UnboundedReceiver<LinkEvent>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let identity = LocalIdentity::generate(config.display_name.clone())?;
        let local_id = transport.local_id().clone();

        tracing::info!(
            local_id = %local_id,
            name = %config.display_name,
            agreement_key = %identity.agreement().fingerprint(),
            signing_key = %identity.signing().fingerprint(),
            mutual_auth = config.mutual_auth,
            "starting session"
        );

        let view = Arc::new(RwLock::new(SessionView::default()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let actor = Actor {
            transport: transport.clone(),
            handshake: Handshake::new(identity, config.mutual_auth),
            registry: PeerRegistry::new(),
            shared: SharedFiles::new(),
            receiver: FileReceiver::new(),
            sender: FileSender::new(config.chunk_delay),
            view: view.clone(),
            event_tx,
            cmd_tx: cmd_tx.clone(),
            send_cancels: HashMap::new(),
            requested: HashSet::new(),
            teardown_grace: config.teardown_grace,
        };
        tokio::spawn(actor.run(link_events, cmd_rx, shutdown_rx));

        Ok(Self {
            local_id,
            transport,
            view,
            cmd_tx,
            event_rx: Some(event_rx),
            shutdown_tx,
        })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    fn command(&self, cmd: Command) -> Result<(), SessionError> {
        self.cmd_tx.send(cmd).map_err(|_| SessionError::Closed)
    }

    /// Replace the shared set and announce it to every verified peer.
    pub fn begin_sharing(&self, files: Vec<SharedFile>) -> Result<(), SessionError> {
        self.command(Command::Share(files))
    }

    pub fn add_file(&self, file: SharedFile) -> Result<(), SessionError> {
        self.command(Command::AddFile(file))
    }

    pub fn remove_file(&self, file_id: &FileId) -> Result<(), SessionError> {
        self.command(Command::RemoveFile(file_id.clone()))
    }

    /// Open a link to `peer`; the handshake starts when the link is up.
    pub fn connect_to_peer(&self, peer: &PeerId) -> Result<(), SessionError> {
        tracing::info!(peer = %peer, "connecting to peer");
        self.transport.connect(peer)?;
        Ok(())
    }

    /// Ask the first live peer whose manifest lists `file_id` to send it.
    ///
    /// Returns the peer the request went to.
    pub async fn request_file(&self, file_id: &FileId) -> Result<PeerId, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::RequestFile {
            file_id: file_id.clone(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Say goodbye to `peer`, then close the link after the teardown grace.
    pub fn remove_peer(&self, peer: &PeerId) -> Result<(), SessionError> {
        self.command(Command::RemovePeer(peer.clone()))
    }

    /// Disconnect from every peer and stop the actor.
    pub fn shutdown(&self) {
        tracing::info!(local_id = %self.local_id, "shutting down session");
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn status(&self, peer: &PeerId) -> Option<ConnectionStatus> {
        self.view.read().await.statuses.get(peer).copied()
    }

    /// Last known status of every peer seen, including ended sessions.
    pub async fn statuses(&self) -> BTreeMap<PeerId, ConnectionStatus> {
        self.view.read().await.statuses.clone()
    }

    pub async fn local_manifest(&self) -> Vec<SharedFileEntry> {
        self.view.read().await.local_manifest.clone()
    }

    pub async fn remote_manifests(&self) -> BTreeMap<PeerId, Vec<SharedFileEntry>> {
        self.view.read().await.remote_manifests.clone()
    }

    /// Progress of every in-flight download, by sending peer.
    pub async fn progress(&self) -> BTreeMap<(PeerId, FileId), u8> {
        self.view.read().await.progress.clone()
    }

    /// Take the event receiver out of the session.
    ///
    /// Once taken, `recv_event()` pends forever.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.event_rx.take()
    }

    pub async fn recv_event(&mut self) -> Option<SessionEvent> {
        match &mut self.event_rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct Actor {
    transport: Arc<dyn Transport>,
    handshake: Handshake,
    registry: PeerRegistry,
    shared: SharedFiles,
    receiver: FileReceiver,
    sender: FileSender,
    view: Arc<RwLock<SessionView>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Cancels in-flight file sends per peer.
    send_cancels: HashMap<PeerId, watch::Sender<bool>>,
    /// Files we asked each peer for. Transfers not listed here are dropped.
    requested: HashSet<(PeerId, FileId)>,
    teardown_grace: Duration,
}

impl Actor {
    async fn run(
        mut self,
        mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::debug!("session event loop started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        self.shutdown().await;
                        break;
                    }
                }

                Some(cmd) = cmd_rx.recv() => {
                    self.handle_command(cmd).await;
                }

                event = link_events.recv() => match event {
                    Some(event) => self.handle_link_event(event).await,
                    None => {
                        tracing::info!("transport event stream ended");
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }

        tracing::debug!("session event loop stopped");
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn send_to(&self, peer: &PeerId, msg: &Message) {
        let data = match encode_message(msg) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(peer = %peer, kind = msg.kind(), error = %e, "failed to encode message");
                return;
            }
        };
        tracing::debug!(peer = %peer, kind = msg.kind(), bytes = data.len(), "sending message");
        if let Err(e) = self.transport.send(peer, Bytes::from(data)) {
            tracing::warn!(peer = %peer, kind = msg.kind(), error = %e, "failed to send message");
        }
    }

    /// Record `status` in the view and announce it.
    async fn publish_status(&self, peer: &PeerId, status: ConnectionStatus) {
        self.view.write().await.statuses.insert(peer.clone(), status);
        self.emit(SessionEvent::StatusChanged {
            peer: peer.clone(),
            status,
        });
    }

    async fn set_status(&mut self, peer: &PeerId, status: ConnectionStatus) {
        if self.registry.set_status(peer, status) {
            self.publish_status(peer, status).await;
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Share(files) => {
                tracing::info!(count = files.len(), "sharing files");
                self.shared.replace(files);
                self.broadcast_manifest().await;
            }
            Command::AddFile(file) => {
                tracing::info!(file_id = %file.id(), file_name = %file.name(), "adding shared file");
                self.shared.add(file);
                self.broadcast_manifest().await;
            }
            Command::RemoveFile(file_id) => {
                if self.shared.remove(&file_id).is_some() {
                    tracing::info!(file_id = %file_id, "removed shared file");
                    self.broadcast_manifest().await;
                } else {
                    tracing::debug!(file_id = %file_id, "remove_file: not shared");
                }
            }
            Command::RequestFile { file_id, reply } => {
                let result = self.request_file(file_id).await;
                let _ = reply.send(result);
            }
            Command::RemovePeer(peer) => self.remove_peer(&peer).await,
            Command::Teardown { peer, generation } => {
                let current = self.registry.get(&peer).map(|s| s.generation);
                if current != Some(generation) {
                    tracing::debug!(peer = %peer, generation, "stale teardown, skipping");
                    return;
                }
                self.transport.close(&peer);
                self.teardown(&peer).await;
            }
        }
    }

    async fn broadcast_manifest(&mut self) {
        let files = self.shared.manifest();
        self.view.write().await.local_manifest = files.clone();
        let peers = self.registry.verified_peers();
        tracing::debug!(files = files.len(), peers = peers.len(), "broadcasting manifest");
        let msg = Message::FilesUpdate { files };
        for peer in &peers {
            self.send_to(peer, &msg);
        }
    }

    async fn request_file(&mut self, file_id: FileId) -> Result<PeerId, SessionError> {
        let holder = {
            let view = self.view.read().await;
            view.remote_manifests
                .iter()
                .filter(|(peer, _)| {
                    self.registry
                        .status(peer)
                        .is_some_and(|status| !status.is_terminal())
                })
                .find(|(_, files)| files.iter().any(|f| f.id == file_id))
                .map(|(peer, _)| peer.clone())
        };
        let Some(peer) = holder else {
            tracing::warn!(file_id = %file_id, "no peer offers requested file");
            return Err(SessionError::NoPeerHasFile(file_id));
        };
        tracing::info!(peer = %peer, file_id = %file_id, "requesting file");
        self.requested.insert((peer.clone(), file_id.clone()));
        self.send_to(&peer, &Message::RequestFile { file_id });
        Ok(peer)
    }

    async fn remove_peer(&mut self, peer: &PeerId) {
        let Some(generation) = self.registry.get(peer).map(|s| s.generation) else {
            tracing::debug!(peer = %peer, "remove_peer: unknown peer");
            return;
        };
        tracing::info!(peer = %peer, "removing peer");
        self.send_to(peer, &Message::Disconnected);
        self.cancel_sends(peer);
        self.set_status(peer, ConnectionStatus::Disconnected).await;

        let cmd_tx = self.cmd_tx.clone();
        let grace = self.teardown_grace;
        let peer = peer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = cmd_tx.send(Command::Teardown { peer, generation });
        });
    }

    /// Drop every piece of state held for `peer`. Its last status stays
    /// visible in the view.
    async fn teardown(&mut self, peer: &PeerId) {
        self.cancel_sends(peer);
        self.registry.remove(peer);
        self.view.write().await.remote_manifests.remove(peer);
        self.abandon_downloads(peer).await;
        tracing::info!(peer = %peer, "peer session torn down");
    }

    /// Discard partial downloads from `peer` and forget what we asked it for.
    async fn abandon_downloads(&mut self, peer: &PeerId) {
        self.requested.retain(|(p, _)| p != peer);
        let abandoned = self.receiver.discard_peer(peer);
        self.view
            .write()
            .await
            .progress
            .retain(|(p, _), _| p != peer);

        for file_id in abandoned {
            tracing::warn!(peer = %peer, file_id = %file_id, "abandoning partial download");
            self.emit(SessionEvent::TransferAbandoned {
                peer: peer.clone(),
                file_id,
            });
        }
    }

    fn cancel_sends(&mut self, peer: &PeerId) {
        if let Some(cancel) = self.send_cancels.remove(peer) {
            let _ = cancel.send(true);
        }
    }

    async fn shutdown(&mut self) {
        let peers: Vec<PeerId> = self
            .registry
            .peers()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.peer.clone())
            .collect();
        for peer in &peers {
            tracing::info!(peer = %peer, "disconnecting on shutdown");
            self.send_to(peer, &Message::Disconnected);
            self.set_status(peer, ConnectionStatus::Disconnected).await;
            self.transport.close(peer);
        }
        let all: Vec<PeerId> = self.registry.peers().map(|s| s.peer.clone()).collect();
        for peer in &all {
            self.teardown(peer).await;
        }
        tracing::info!("session event loop shutting down");
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Open { peer, role } => self.on_open(&peer, role).await,
            LinkEvent::Message { peer, data } => {
                self.transport.transport_metrics().record_received(data.len());
                self.on_message(&peer, &data).await;
            }
            LinkEvent::Closed { peer } => {
                tracing::info!(peer = %peer, "link closed");
                self.on_link_lost(&peer).await;
            }
            LinkEvent::Error { peer, error } => {
                tracing::warn!(peer = %peer, error = %error, "link failed");
                self.on_link_lost(&peer).await;
            }
        }
    }

    async fn on_open(&mut self, peer: &PeerId, role: LinkRole) {
        if self.registry.contains(peer) {
            tracing::info!(peer = %peer, "new link replaces existing session");
            self.teardown(peer).await;
        }
        tracing::info!(peer = %peer, ?role, "link open");
        let step = self.handshake.on_open(&mut self.registry, peer, role);
        for msg in &step.replies {
            self.send_to(peer, msg);
        }
        self.publish_status(peer, ConnectionStatus::Connecting).await;
    }

    async fn on_link_lost(&mut self, peer: &PeerId) {
        if !self.registry.contains(peer) {
            return;
        }
        self.set_status(peer, ConnectionStatus::Disconnected).await;
        self.teardown(peer).await;
    }

    async fn on_message(&mut self, peer: &PeerId, data: &[u8]) {
        let msg = match decode_message(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "dropping undecodable message");
                return;
            }
        };

        match self.registry.status(peer) {
            Some(status) if status.is_terminal() => {
                tracing::debug!(peer = %peer, kind = msg.kind(), ?status, "dropping message from ended session");
                return;
            }
            None if !matches!(msg, Message::Hello { .. }) => {
                tracing::warn!(peer = %peer, kind = msg.kind(), "dropping message from unknown peer");
                return;
            }
            _ => {}
        }
        tracing::debug!(peer = %peer, kind = msg.kind(), "received message");

        let file_message = matches!(
            msg,
            Message::FilesUpdate { .. } | Message::FileMetadata(_) | Message::FileChunk(_)
        );
        if file_message && self.registry.shared_key(peer).is_none() {
            tracing::warn!(peer = %peer, kind = msg.kind(), "dropping file message before key exchange");
            return;
        }

        match msg {
            Message::Hello { .. }
            | Message::KeyExchange { .. }
            | Message::KeyExchangeReply { .. }
            | Message::Challenge { .. }
            | Message::ChallengeResponse { .. }
            | Message::VerificationComplete => {
                match self.handshake.on_message(&mut self.registry, peer, &msg) {
                    Ok(step) => self.apply_step(peer, step).await,
                    Err(e) => self.handshake_failed(peer, e).await,
                }
            }
            Message::Disconnected => {
                tracing::info!(peer = %peer, "peer disconnected");
                self.set_status(peer, ConnectionStatus::Disconnected).await;
                self.transport.close(peer);
                self.teardown(peer).await;
            }
            Message::FilesUpdate { files } => {
                tracing::info!(peer = %peer, files = files.len(), "peer manifest updated");
                self.view
                    .write()
                    .await
                    .remote_manifests
                    .insert(peer.clone(), files.clone());
                self.emit(SessionEvent::PeerManifest {
                    peer: peer.clone(),
                    files,
                });
            }
            Message::RequestFile { file_id } => self.serve_file(peer, file_id),
            Message::FileMetadata(meta) => self.on_file_metadata(peer, meta).await,
            Message::FileChunk(chunk) => self.on_file_chunk(peer, chunk).await,
        }
    }

    async fn apply_step(&mut self, peer: &PeerId, step: HandshakeStep) {
        for msg in &step.replies {
            self.send_to(peer, msg);
        }
        if step.verified_peer && !self.shared.is_empty() {
            self.send_to(
                peer,
                &Message::FilesUpdate {
                    files: self.shared.manifest(),
                },
            );
        }
        if let Some(status) = step.status {
            self.set_status(peer, status).await;
        }
    }

    async fn handshake_failed(&mut self, peer: &PeerId, error: HandshakeError) {
        tracing::warn!(peer = %peer, error = %error, "handshake failed");
        self.cancel_sends(peer);
        self.abandon_downloads(peer).await;
        self.set_status(peer, ConnectionStatus::Error).await;
        self.emit(SessionEvent::HandshakeFailed {
            peer: peer.clone(),
            error: error.to_string(),
        });
    }

    /// Stream a shared file to `peer` on its own task.
    fn serve_file(&mut self, peer: &PeerId, file_id: FileId) {
        if !self.registry.is_verified(peer) {
            tracing::warn!(peer = %peer, file_id = %file_id, "ignoring file request from unverified peer");
            return;
        }
        let Some(file) = self.shared.get(&file_id).cloned() else {
            tracing::debug!(peer = %peer, file_id = %file_id, "request for file not shared");
            return;
        };

        let key = self.registry.shared_key(peer).cloned();
        let mut cancel_rx = self
            .send_cancels
            .entry(peer.clone())
            .or_insert_with(|| watch::channel(false).0)
            .subscribe();
        let sender = self.sender.clone();
        let transport = self.transport.clone();
        let peer = peer.clone();

        tokio::spawn(async move {
            let emit = |msg: Message| -> anyhow::Result<()> {
                let data = encode_message(&msg)?;
                transport.send(&peer, Bytes::from(data))
            };
            tokio::select! {
                result = sender.send_file(&file, key.as_ref(), emit) => {
                    if let Err(e) = result {
                        tracing::warn!(peer = %peer, file_id = %file.id(), error = %e, "file send failed");
                    }
                }
                _ = cancel_rx.changed() => {
                    tracing::info!(peer = %peer, file_id = %file.id(), "file send cancelled");
                }
            }
        });
    }

    async fn on_file_metadata(&mut self, peer: &PeerId, meta: FileMetadata) {
        let request = (peer.clone(), meta.file_id.clone());
        if !self.requested.contains(&request) {
            tracing::warn!(peer = %peer, file_id = %meta.file_id, "dropping metadata for file not requested");
            return;
        }
        match self.receiver.on_metadata(peer, &meta) {
            Ok(Some(file)) => {
                self.requested.remove(&request);
                self.deliver(peer, file);
            }
            Ok(None) => {
                self.view.write().await.progress.insert(request, 0);
                self.emit(SessionEvent::Progress {
                    peer: peer.clone(),
                    file_id: meta.file_id,
                    percent: 0,
                });
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "rejected file metadata");
                self.requested.remove(&request);
                self.emit(SessionEvent::TransferFailed {
                    peer: peer.clone(),
                    file_id: e.file_id().clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn on_file_chunk(&mut self, peer: &PeerId, chunk: FileChunk) {
        let request = (peer.clone(), chunk.file_id.clone());
        if !self.requested.contains(&request) {
            tracing::debug!(peer = %peer, file_id = %chunk.file_id, "dropping chunk for file not requested");
            return;
        }
        let file_id = chunk.file_id.clone();
        let key = self.registry.shared_key(peer).cloned();
        match self.receiver.on_chunk(peer, chunk, key.as_ref()) {
            Ok(ChunkOutcome::Progress(percent)) => {
                self.view.write().await.progress.insert(request, percent);
                self.emit(SessionEvent::Progress {
                    peer: peer.clone(),
                    file_id,
                    percent,
                });
            }
            Ok(ChunkOutcome::Complete(file)) => {
                self.view.write().await.progress.remove(&request);
                self.requested.remove(&request);
                self.deliver(peer, file);
            }
            Ok(ChunkOutcome::Duplicate | ChunkOutcome::Ignored) => {}
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "file transfer aborted");
                self.view.write().await.progress.remove(&request);
                self.requested.remove(&request);
                self.emit(SessionEvent::TransferFailed {
                    peer: peer.clone(),
                    file_id,
                    error: e.to_string(),
                });
            }
        }
    }

    fn deliver(&self, peer: &PeerId, file: CompletedFile) {
        tracing::info!(
            peer = %peer,
            file_id = %file.file_id,
            file_name = %file.name,
            bytes = file.data.len(),
            "file received"
        );
        self.emit(SessionEvent::FileReceived {
            peer: peer.clone(),
            file,
        });
    }
}

//! Abstract message-channel transport between peers.
//!
//! A [`Transport`] owns point-to-point logical channels to remote peers and
//! reports their lifecycle as [`LinkEvent`]s on an unbounded receiver handed
//! out when the transport is created. Channel establishment, NAT traversal,
//! and retransmission are the transport's business; sessions only send and
//! receive whole messages.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use bytes::Bytes;
use duet_protocol::PeerId;

/// Which side initiated a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// We called [`Transport::connect`].
    Connector,
    /// The remote peer connected to us.
    Acceptor,
}

/// Link lifecycle and inbound traffic, in the order the transport observed it.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A channel to `peer` is open and ready for `send`.
    Open { peer: PeerId, role: LinkRole },
    /// A whole message arrived from `peer`.
    Message { peer: PeerId, data: Bytes },
    /// The channel was closed by the remote side or the network.
    Closed { peer: PeerId },
    /// The channel failed. No further events follow for this link.
    Error { peer: PeerId, error: String },
}

impl LinkEvent {
    /// The peer this event concerns.
    pub fn peer(&self) -> &PeerId {
        match self {
            LinkEvent::Open { peer, .. }
            | LinkEvent::Message { peer, .. }
            | LinkEvent::Closed { peer }
            | LinkEvent::Error { peer, .. } => peer,
        }
    }
}

/// Counters tracked by a transport implementation.
#[derive(Debug, Default)]
pub struct TransportMetrics {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_dropped: AtomicU64,
    pub links_opened: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
}

impl TransportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_link_opened(&self) {
        self.links_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }
}

/// Message-oriented transport to directly connected peers.
///
/// Methods are synchronous and non-blocking so a transport can be shared as
/// `Arc<dyn Transport>` between the session actor and its send tasks.
pub trait Transport: Send + Sync {
    /// Identity the transport assigned to us; remote peers see this id.
    fn local_id(&self) -> &PeerId;

    /// Open a channel to `peer`. Success is reported later as
    /// [`LinkEvent::Open`] with [`LinkRole::Connector`].
    fn connect(&self, peer: &PeerId) -> Result<()>;

    /// Queue one message for `peer`. Errors if no channel to `peer` exists.
    fn send(&self, peer: &PeerId, data: Bytes) -> Result<()>;

    /// Close the channel to `peer`. Unknown peers are ignored.
    fn close(&self, peer: &PeerId);

    fn transport_metrics(&self) -> &TransportMetrics;
}

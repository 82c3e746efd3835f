//! Per-peer session records: key material, verification, challenges, status.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use duet_crypto::{
    derive_shared_key, generate_challenge, validate_public_key, CryptoError, KeyPair, SessionKey,
    CHALLENGE_LEN,
};
use duet_net::LinkRole;
use duet_protocol::PeerId;
use thiserror::Error;

/// Lifecycle of one peer session.
///
/// Progresses `Connecting → Verifying → Connected`; `Error` and
/// `Disconnected` are terminal and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Connecting,
    Verifying,
    Connected,
    Error,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Error | ConnectionStatus::Disconnected)
    }

    fn rank(self) -> u8 {
        match self {
            ConnectionStatus::Connecting => 0,
            ConnectionStatus::Verifying => 1,
            ConnectionStatus::Connected => 2,
            ConnectionStatus::Error | ConnectionStatus::Disconnected => 3,
        }
    }

    /// Whether moving from `self` to `next` respects the one-way ordering.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("no public key recorded for peer {0}")]
    MissingPublicKey(PeerId),

    #[error("no shared key established with peer {0}")]
    NoSharedKey(PeerId),

    #[error("invalid key material from peer {peer}: {source}")]
    InvalidKey {
        peer: PeerId,
        #[source]
        source: CryptoError,
    },

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Everything we know about one remote peer.
#[derive(Debug)]
pub struct PeerSession {
    pub peer: PeerId,
    /// Distinguishes successive sessions with the same peer id.
    pub generation: u64,
    pub role: LinkRole,
    pub display_name: Option<String>,
    pub status: ConnectionStatus,
    pub dh_public_key: Option<Vec<u8>>,
    pub signing_public_key: Option<Vec<u8>>,
    shared_key: Option<SessionKey>,
    is_verified: bool,
    outstanding_challenge: Option<[u8; CHALLENGE_LEN]>,
    /// Our own public keys have gone out on this link.
    pub keys_sent: bool,
    /// The peer told us it verified our signature.
    pub verified_by_peer: bool,
}

impl PeerSession {
    fn new(peer: PeerId, generation: u64, role: LinkRole) -> Self {
        Self {
            peer,
            generation,
            role,
            display_name: None,
            status: ConnectionStatus::Connecting,
            dh_public_key: None,
            signing_public_key: None,
            shared_key: None,
            is_verified: false,
            outstanding_challenge: None,
            keys_sent: false,
            verified_by_peer: false,
        }
    }

    pub fn shared_key(&self) -> Option<&SessionKey> {
        self.shared_key.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn has_outstanding_challenge(&self) -> bool {
        self.outstanding_challenge.is_some()
    }
}

/// All peer sessions of one local session, keyed by transport peer id.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerSession>,
    next_generation: u64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session record for `peer`, replacing any previous one.
    pub fn register(&mut self, peer: &PeerId, role: LinkRole) -> &mut PeerSession {
        self.next_generation += 1;
        let session = PeerSession::new(peer.clone(), self.next_generation, role);
        tracing::debug!(peer = %peer, ?role, "registered peer");
        match self.peers.entry(peer.clone()) {
            Entry::Occupied(mut entry) => {
                tracing::debug!(peer = %peer, "replaced existing peer session");
                entry.insert(session);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PeerSession> {
        self.peers.get(peer)
    }

    pub fn get_mut(&mut self, peer: &PeerId) -> Option<&mut PeerSession> {
        self.peers.get_mut(peer)
    }

    fn session_mut(&mut self, peer: &PeerId) -> Result<&mut PeerSession, RegistryError> {
        self.peers
            .get_mut(peer)
            .ok_or_else(|| RegistryError::UnknownPeer(peer.clone()))
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<PeerSession> {
        let removed = self.peers.remove(peer);
        if removed.is_some() {
            tracing::debug!(peer = %peer, "removed peer session");
        }
        removed
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerSession> {
        self.peers.values()
    }

    /// Store the peer's public keys after checking both decode as curve points.
    pub fn record_peer_public_keys(
        &mut self,
        peer: &PeerId,
        dh_public_key: &[u8],
        signing_public_key: &[u8],
    ) -> Result<(), RegistryError> {
        for key in [dh_public_key, signing_public_key] {
            validate_public_key(key).map_err(|source| RegistryError::InvalidKey {
                peer: peer.clone(),
                source,
            })?;
        }
        let session = self.session_mut(peer)?;
        session.dh_public_key = Some(dh_public_key.to_vec());
        session.signing_public_key = Some(signing_public_key.to_vec());
        Ok(())
    }

    /// Derive the session key from the recorded peer key. Once stored, the
    /// key is returned unchanged on later calls.
    pub fn derive_and_store_shared_key(
        &mut self,
        peer: &PeerId,
        local: &KeyPair,
    ) -> Result<SessionKey, RegistryError> {
        let session = self.session_mut(peer)?;
        if let Some(key) = &session.shared_key {
            return Ok(key.clone());
        }
        let remote = session
            .dh_public_key
            .as_deref()
            .ok_or_else(|| RegistryError::MissingPublicKey(peer.clone()))?;
        let key = derive_shared_key(local, remote)?;
        session.shared_key = Some(key.clone());
        tracing::debug!(peer = %peer, key = ?key, "derived shared key");
        Ok(key)
    }

    pub fn shared_key(&self, peer: &PeerId) -> Option<&SessionKey> {
        self.peers.get(peer).and_then(PeerSession::shared_key)
    }

    /// Issue a fresh challenge for `peer`, replacing any unanswered one.
    pub fn issue_challenge(&mut self, peer: &PeerId) -> Result<[u8; CHALLENGE_LEN], RegistryError> {
        let challenge = generate_challenge()?;
        let session = self.session_mut(peer)?;
        if session.outstanding_challenge.replace(challenge).is_some() {
            tracing::debug!(peer = %peer, "overwrote unanswered challenge");
        }
        Ok(challenge)
    }

    /// Take the outstanding challenge, leaving none behind.
    pub fn consume_challenge(
        &mut self,
        peer: &PeerId,
    ) -> Result<Option<[u8; CHALLENGE_LEN]>, RegistryError> {
        Ok(self.session_mut(peer)?.outstanding_challenge.take())
    }

    /// Mark `peer` as having proven possession of its signing key.
    pub fn mark_verified(&mut self, peer: &PeerId) -> Result<(), RegistryError> {
        let session = self.session_mut(peer)?;
        if session.shared_key.is_none() {
            return Err(RegistryError::NoSharedKey(peer.clone()));
        }
        session.is_verified = true;
        Ok(())
    }

    pub fn is_verified(&self, peer: &PeerId) -> bool {
        self.peers.get(peer).is_some_and(PeerSession::is_verified)
    }

    /// Move `peer` to `status` if the transition is allowed.
    ///
    /// Returns whether the status changed.
    pub fn set_status(&mut self, peer: &PeerId, status: ConnectionStatus) -> bool {
        let Some(session) = self.peers.get_mut(peer) else {
            return false;
        };
        if !session.status.can_transition_to(status) {
            if session.status != status {
                tracing::debug!(
                    peer = %peer,
                    from = ?session.status,
                    to = ?status,
                    "ignoring status transition"
                );
            }
            return false;
        }
        tracing::info!(peer = %peer, from = ?session.status, to = ?status, "peer status changed");
        session.status = status;
        true
    }

    pub fn status(&self, peer: &PeerId) -> Option<ConnectionStatus> {
        self.peers.get(peer).map(|s| s.status)
    }

    /// Peers we verified whose sessions are still live.
    pub fn verified_peers(&self) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|s| s.is_verified && !s.status.is_terminal())
            .map(|s| s.peer.clone())
            .collect()
    }
}

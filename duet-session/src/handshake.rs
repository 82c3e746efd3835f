//! Handshake state machine: hello, key exchange, challenge, verification.
//!
//! The machine is pure: it reads and updates the [`PeerRegistry`] and says
//! which messages to send and which status the peer should move to. The
//! session actor performs the I/O.
//!
//! ```text
//! connector                         acceptor
//!   Open ──── Hello ─────────────────▶ register
//!        ◀──────────────── KeyExchange
//!   derive ── KeyExchangeReply ──────▶ derive
//!        ◀────────────────── Challenge
//!   sign ──── ChallengeResponse ─────▶ verify
//!        ◀──────── VerificationComplete (+ FilesUpdate)
//! ```
//!
//! With mutual authentication the connector then challenges the acceptor
//! the same way before either side reports `Connected`.

use duet_crypto::{sign, verify, CryptoError, KeyPair};
use duet_net::LinkRole;
use duet_protocol::{Message, PeerId};
use thiserror::Error;

use crate::registry::{ConnectionStatus, PeerRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake message from unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("{0} sent key material after the session key was derived")]
    UnexpectedKeyExchange(PeerId),

    #[error("challenge response from {0} with no outstanding challenge")]
    UnexpectedResponse(PeerId),

    #[error("signature from {0} did not verify")]
    SignatureRejected(PeerId),

    #[error("no signing key recorded for {0}")]
    MissingSigningKey(PeerId),

    #[error("{0} is not a handshake message")]
    NotHandshake(&'static str),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Our ephemeral key material and display name for one session.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    display_name: String,
    agreement: KeyPair,
    signing: KeyPair,
}

impl LocalIdentity {
    /// Generate both key pairs.
    pub fn generate(display_name: impl Into<String>) -> Result<Self, CryptoError> {
        Ok(Self {
            display_name: display_name.into(),
            agreement: duet_crypto::generate_key_agreement_pair()?,
            signing: duet_crypto::generate_signing_pair()?,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn agreement(&self) -> &KeyPair {
        &self.agreement
    }

    pub fn signing(&self) -> &KeyPair {
        &self.signing
    }
}

/// What the session should do after one handshake input.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HandshakeStep {
    /// Messages to send to the peer, in order.
    pub replies: Vec<Message>,
    /// Status to move the peer to, if any.
    pub status: Option<ConnectionStatus>,
    /// We just verified the peer; our manifest should follow the replies.
    pub verified_peer: bool,
}

impl HandshakeStep {
    fn reply(message: Message) -> Self {
        Self {
            replies: vec![message],
            ..Self::default()
        }
    }
}

pub struct Handshake {
    identity: LocalIdentity,
    mutual_auth: bool,
}

impl Handshake {
    pub fn new(identity: LocalIdentity, mutual_auth: bool) -> Self {
        Self {
            identity,
            mutual_auth,
        }
    }

    /// A channel to `peer` opened: start a fresh session record. The
    /// connector speaks first.
    pub fn on_open(&self, registry: &mut PeerRegistry, peer: &PeerId, role: LinkRole) -> HandshakeStep {
        registry.register(peer, role);
        let mut step = HandshakeStep {
            status: Some(ConnectionStatus::Connecting),
            ..HandshakeStep::default()
        };
        if role == LinkRole::Connector {
            step.replies.push(Message::Hello {
                name: self.identity.display_name.clone(),
            });
        }
        step
    }

    /// Advance the handshake with one inbound message from `peer`.
    pub fn on_message(
        &self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        message: &Message,
    ) -> Result<HandshakeStep, HandshakeError> {
        match message {
            Message::Hello { name } => self.on_hello(registry, peer, name),
            Message::KeyExchange {
                dh_public_key,
                signing_public_key,
            } => self.on_key_exchange(registry, peer, dh_public_key, signing_public_key, false),
            Message::KeyExchangeReply {
                dh_public_key,
                signing_public_key,
            } => self.on_key_exchange(registry, peer, dh_public_key, signing_public_key, true),
            Message::Challenge { challenge } => self.on_challenge(registry, peer, challenge),
            Message::ChallengeResponse { signature } => {
                self.on_challenge_response(registry, peer, signature)
            }
            Message::VerificationComplete => self.on_verification_complete(registry, peer),
            other => Err(HandshakeError::NotHandshake(other.kind())),
        }
    }

    fn key_exchange_keys(&self) -> (Vec<u8>, Vec<u8>) {
        (
            self.identity.agreement.public_key_bytes(),
            self.identity.signing.public_key_bytes(),
        )
    }

    fn on_hello(
        &self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        name: &str,
    ) -> Result<HandshakeStep, HandshakeError> {
        if !registry.contains(peer) {
            registry.register(peer, LinkRole::Acceptor);
        }
        let Some(session) = registry.get_mut(peer) else {
            return Err(HandshakeError::UnknownPeer(peer.clone()));
        };
        session.display_name = Some(name.to_string());
        tracing::info!(peer = %peer, name, "hello received");

        if session.keys_sent {
            return Ok(HandshakeStep::default());
        }
        session.keys_sent = true;
        let (dh_public_key, signing_public_key) = self.key_exchange_keys();
        Ok(HandshakeStep::reply(Message::KeyExchange {
            dh_public_key,
            signing_public_key,
        }))
    }

    /// Record the peer's keys and derive the session key. The side that had
    /// not yet sent its keys answers with a reply; the other side advances
    /// to the challenge. Keys are accepted once per session.
    fn on_key_exchange(
        &self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        dh_public_key: &[u8],
        signing_public_key: &[u8],
        is_reply: bool,
    ) -> Result<HandshakeStep, HandshakeError> {
        if !registry.contains(peer) {
            return Err(HandshakeError::UnknownPeer(peer.clone()));
        }
        if registry.shared_key(peer).is_some() {
            return Err(HandshakeError::UnexpectedKeyExchange(peer.clone()));
        }
        registry.record_peer_public_keys(peer, dh_public_key, signing_public_key)?;
        registry.derive_and_store_shared_key(peer, &self.identity.agreement)?;

        let keys_sent = registry.get(peer).is_some_and(|s| s.keys_sent);
        tracing::debug!(peer = %peer, is_reply, keys_sent, "peer keys recorded");

        if !keys_sent {
            if let Some(session) = registry.get_mut(peer) {
                session.keys_sent = true;
            }
            let (dh_public_key, signing_public_key) = self.key_exchange_keys();
            return Ok(HandshakeStep {
                replies: vec![Message::KeyExchangeReply {
                    dh_public_key,
                    signing_public_key,
                }],
                status: Some(ConnectionStatus::Verifying),
                verified_peer: false,
            });
        }

        let challenge = registry.issue_challenge(peer)?;
        tracing::debug!(peer = %peer, "challenge issued");
        Ok(HandshakeStep {
            replies: vec![Message::Challenge { challenge }],
            status: Some(ConnectionStatus::Verifying),
            verified_peer: false,
        })
    }

    fn on_challenge(
        &self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        challenge: &[u8],
    ) -> Result<HandshakeStep, HandshakeError> {
        if !registry.contains(peer) {
            return Err(HandshakeError::UnknownPeer(peer.clone()));
        }
        let signature = sign(challenge, &self.identity.signing);
        tracing::debug!(peer = %peer, "answering challenge");
        Ok(HandshakeStep::reply(Message::ChallengeResponse {
            signature: signature.to_vec(),
        }))
    }

    fn on_challenge_response(
        &self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        signature: &[u8],
    ) -> Result<HandshakeStep, HandshakeError> {
        let Some(challenge) = registry.consume_challenge(peer)? else {
            return Err(HandshakeError::UnexpectedResponse(peer.clone()));
        };
        let signing_public_key = registry
            .get(peer)
            .and_then(|s| s.signing_public_key.clone())
            .ok_or_else(|| HandshakeError::MissingSigningKey(peer.clone()))?;

        if !verify(&challenge, signature, &signing_public_key) {
            return Err(HandshakeError::SignatureRejected(peer.clone()));
        }

        registry.mark_verified(peer)?;
        tracing::info!(peer = %peer, "peer verified");

        let verified_by_peer = registry.get(peer).is_some_and(|s| s.verified_by_peer);
        let status = (!self.mutual_auth || verified_by_peer).then_some(ConnectionStatus::Connected);
        Ok(HandshakeStep {
            replies: vec![Message::VerificationComplete],
            status,
            verified_peer: true,
        })
    }

    fn on_verification_complete(
        &self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
    ) -> Result<HandshakeStep, HandshakeError> {
        let Some(session) = registry.get_mut(peer) else {
            return Err(HandshakeError::UnknownPeer(peer.clone()));
        };
        session.verified_by_peer = true;
        tracing::info!(peer = %peer, "peer verified us");

        if self.mutual_auth && !session.is_verified() {
            let challenge = registry.issue_challenge(peer)?;
            tracing::debug!(peer = %peer, "issuing reverse challenge");
            return Ok(HandshakeStep::reply(Message::Challenge { challenge }));
        }

        Ok(HandshakeStep {
            status: Some(ConnectionStatus::Connected),
            ..HandshakeStep::default()
        })
    }
}

//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use duet_net::sim::{SimNetwork, SimPeer};
use duet_protocol::{decode_message, encode_message, Message, PeerId};
use duet_session::{ConnectionStatus, Session, SessionConfig, SessionEvent};
use tokio::sync::mpsc::UnboundedReceiver;

pub fn test_config() -> SessionConfig {
    SessionConfig {
        chunk_delay: Duration::from_millis(5),
        ..SessionConfig::default()
    }
}

/// Start a session on a fresh sim peer named `name`.
pub fn start_session(
    net: &SimNetwork,
    name: &str,
    config: SessionConfig,
) -> (Session, UnboundedReceiver<SessionEvent>) {
    let peer = net.create_peer(name).unwrap();
    let (transport, events) = peer.into_parts();
    let config = SessionConfig {
        display_name: name.to_string(),
        ..config
    };
    let mut session = Session::start(Arc::new(transport), events, config).unwrap();
    let rx = session.take_event_receiver().unwrap();
    (session, rx)
}

/// Status changes reported for `peer`, in order.
pub fn statuses_for(events: &[SessionEvent], peer: &PeerId) -> Vec<ConnectionStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StatusChanged { peer: p, status } if p == peer => Some(*status),
            _ => None,
        })
        .collect()
}

pub fn manifest_count(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::PeerManifest { .. }))
        .count()
}

/// Send a protocol message from a hand-driven sim peer.
pub fn send_raw(from: &SimPeer, to: &PeerId, msg: &Message) {
    from.send(to, Bytes::from(encode_message(msg).unwrap()))
        .unwrap();
}

/// Next protocol message arriving at a hand-driven sim peer.
pub async fn recv_raw(peer: &mut SimPeer) -> Message {
    let (_, data) = peer.recv_message().await.unwrap();
    decode_message(&data).unwrap()
}

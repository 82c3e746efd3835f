//! Shared test helpers for multi-peer integration tests.
//!
//! Re-exports from `duet_net::testing` for convenience.

use std::sync::Arc;
use std::time::Duration;

use duet_net::sim::SimNetwork;
use duet_session::{Session, SessionConfig, SessionEvent};
use tokio::sync::mpsc::UnboundedReceiver;

pub use duet_net::testing::{
    collect_events, init_test_tracing, wait_for_event, TestTimer, HANDSHAKE_TIMEOUT_SECS,
    TRANSFER_TIMEOUT_SECS,
};

/// Start a session named `name` with a short chunk delay.
pub fn setup_session(net: &SimNetwork, name: &str) -> (Session, UnboundedReceiver<SessionEvent>) {
    let (transport, events) = net.create_peer(name).unwrap().into_parts();
    let config = SessionConfig {
        display_name: name.to_string(),
        chunk_delay: Duration::from_millis(2),
        ..SessionConfig::default()
    };
    let mut session = Session::start(Arc::new(transport), events, config).unwrap();
    let rx = session.take_event_receiver().unwrap();
    (session, rx)
}

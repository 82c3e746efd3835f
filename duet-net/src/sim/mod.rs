//! Deterministic in-process network simulation harness.
//!
//! Provides [`SimNetwork`] to register simulated peers that exchange whole
//! messages over in-process channels with configurable latency, loss,
//! jitter, and disconnection. No real sockets are involved.
//!
//! # Example
//!
//! ```ignore
//! let sim = SimNetwork::new();
//! let alice = sim.create_peer("alice")?;
//! let mut bob = sim.create_peer("bob")?;
//! sim.set_latency(Duration::from_millis(50));
//!
//! alice.connect(bob.id())?;
//! alice.send(bob.id(), Bytes::from("hello"))?;
//! let (from, data) = bob.recv_message().await?;
//! ```

mod network;
mod peer;
mod transport;

pub use network::SimNetwork;
pub use peer::SimPeer;
pub use transport::SimTransport;

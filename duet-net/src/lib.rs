//! Transport contract consumed by duet sessions, and an in-process
//! simulated network implementing it.

pub mod sim;
pub mod testing;
pub mod transport;

pub use transport::{LinkEvent, LinkRole, Transport, TransportMetrics};

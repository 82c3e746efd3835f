//! Simulated transport implementing the [`Transport`] trait.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use duet_protocol::PeerId;

use crate::transport::{Transport, TransportMetrics};

use super::network::SimNetworkInner;

/// One peer's handle onto the [`SimNetwork`](super::SimNetwork).
///
/// Cheap to clone; clones share the same identity and metrics.
#[derive(Clone)]
pub struct SimTransport {
    local_id: PeerId,
    network: Arc<SimNetworkInner>,
    metrics: Arc<TransportMetrics>,
}

impl SimTransport {
    pub(crate) fn new(
        local_id: PeerId,
        network: Arc<SimNetworkInner>,
        metrics: Arc<TransportMetrics>,
    ) -> Self {
        Self {
            local_id,
            network,
            metrics,
        }
    }
}

impl Transport for SimTransport {
    fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    fn connect(&self, peer: &PeerId) -> Result<()> {
        self.network.open_link(&self.local_id, peer)?;
        self.metrics.record_link_opened();
        Ok(())
    }

    fn send(&self, peer: &PeerId, data: Bytes) -> Result<()> {
        self.network
            .route_message(&self.local_id, peer, data, &self.metrics)
    }

    fn close(&self, peer: &PeerId) {
        self.network.close_link(&self.local_id, peer);
    }

    fn transport_metrics(&self) -> &TransportMetrics {
        &self.metrics
    }
}

//! Simulated peer: a transport plus the event stream it feeds.

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use duet_protocol::PeerId;
use tokio::sync::mpsc;

use crate::transport::{LinkEvent, Transport, TransportMetrics};

use super::transport::SimTransport;

/// A registered peer on a [`SimNetwork`](super::SimNetwork).
///
/// Either drive it directly in tests (`send`/`recv_event`) or split it with
/// [`SimPeer::into_parts`] and hand both halves to a session.
pub struct SimPeer {
    transport: SimTransport,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl SimPeer {
    pub(crate) fn new(transport: SimTransport, events: mpsc::UnboundedReceiver<LinkEvent>) -> Self {
        Self { transport, events }
    }

    pub fn id(&self) -> &PeerId {
        self.transport.local_id()
    }

    pub fn connect(&self, peer: &PeerId) -> Result<()> {
        self.transport.connect(peer)
    }

    pub fn send(&self, peer: &PeerId, data: Bytes) -> Result<()> {
        self.transport.send(peer, data)
    }

    pub fn close(&self, peer: &PeerId) {
        self.transport.close(peer)
    }

    /// Next link event, counting inbound messages in the metrics.
    pub async fn recv_event(&mut self) -> Result<LinkEvent> {
        let event = self
            .events
            .recv()
            .await
            .context("sim peer event channel closed")?;
        if let LinkEvent::Message { data, .. } = &event {
            self.transport.transport_metrics().record_received(data.len());
        }
        Ok(event)
    }

    /// Next inbound message payload, skipping lifecycle events.
    pub async fn recv_message(&mut self) -> Result<(PeerId, Bytes)> {
        loop {
            if let LinkEvent::Message { peer, data } = self.recv_event().await? {
                return Ok((peer, data));
            }
        }
    }

    /// Like [`recv_event`](Self::recv_event) but gives up after `timeout`.
    pub async fn recv_event_timeout(&mut self, timeout: Duration) -> Option<LinkEvent> {
        tokio::time::timeout(timeout, self.recv_event())
            .await
            .ok()
            .and_then(Result::ok)
    }

    pub fn metrics(&self) -> &TransportMetrics {
        self.transport.transport_metrics()
    }

    pub fn messages_sent(&self) -> u64 {
        self.metrics().messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.metrics().messages_received.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.metrics().messages_dropped.load(Ordering::Relaxed)
    }

    pub fn transport(&self) -> &SimTransport {
        &self.transport
    }

    /// Split into the transport and its event stream.
    pub fn into_parts(self) -> (SimTransport, mpsc::UnboundedReceiver<LinkEvent>) {
        (self.transport, self.events)
    }
}

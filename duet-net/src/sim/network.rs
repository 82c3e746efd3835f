//! Simulation network controller.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use bytes::Bytes;
use duet_protocol::PeerId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{LinkEvent, LinkRole, TransportMetrics};

use super::peer::SimPeer;
use super::transport::SimTransport;

/// Conditions for a single link direction. `None` falls back to the default.
#[derive(Debug, Clone, Default)]
struct LinkConfig {
    latency: Option<Duration>,
    loss_rate: Option<f64>,
    jitter: Option<Duration>,
}

/// One direction of an open link: an ordered delivery pipe into the
/// receiving peer's event stream.
struct LinkPipe {
    tx: mpsc::UnboundedSender<(Instant, LinkEvent)>,
}

struct SimState {
    /// Event stream of every registered peer.
    endpoints: HashMap<PeerId, mpsc::UnboundedSender<LinkEvent>>,
    /// Open links keyed by (from, to).
    links: HashMap<(PeerId, PeerId), LinkPipe>,
    link_configs: HashMap<(PeerId, PeerId), LinkConfig>,
    default_latency: Duration,
    default_loss_rate: f64,
    default_jitter: Duration,
    /// Peers whose traffic is currently dropped.
    disconnected: HashSet<PeerId>,
    rng: StdRng,
}

/// Shared interior of the simulation network.
pub(crate) struct SimNetworkInner {
    state: Mutex<SimState>,
}

impl SimNetworkInner {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a link from `from` to `to`, announcing it on both event streams.
    pub(crate) fn open_link(&self, from: &PeerId, to: &PeerId) -> Result<()> {
        let mut state = self.state();
        if from == to {
            bail!("cannot connect {from} to itself");
        }
        let Some(local_events) = state.endpoints.get(from).cloned() else {
            bail!("unknown local peer {from}");
        };
        let Some(remote_events) = state.endpoints.get(to).cloned() else {
            bail!("unknown peer {to}");
        };
        if state.disconnected.contains(from) || state.disconnected.contains(to) {
            bail!("peer {to} unreachable");
        }
        if state.links.contains_key(&(from.clone(), to.clone())) {
            bail!("already linked to {to}");
        }

        let forward = spawn_pipe(remote_events);
        let backward = spawn_pipe(local_events.clone());

        // The acceptor's Open travels through the pipe so it precedes any
        // message the connector sends once it sees its own Open.
        let _ = forward.tx.send((
            Instant::now(),
            LinkEvent::Open {
                peer: from.clone(),
                role: LinkRole::Acceptor,
            },
        ));
        let _ = local_events.send(LinkEvent::Open {
            peer: to.clone(),
            role: LinkRole::Connector,
        });

        state.links.insert((from.clone(), to.clone()), forward);
        state.links.insert((to.clone(), from.clone()), backward);
        tracing::info!(from = %from, to = %to, "sim link opened");
        Ok(())
    }

    /// Route a message from `from` to `to`, applying loss, latency, and jitter.
    pub(crate) fn route_message(
        &self,
        from: &PeerId,
        to: &PeerId,
        data: Bytes,
        sender_metrics: &TransportMetrics,
    ) -> Result<()> {
        let mut state = self.state();
        let key = (from.clone(), to.clone());
        if !state.links.contains_key(&key) {
            bail!("no link from {from} to {to}");
        }

        if state.disconnected.contains(from) || state.disconnected.contains(to) {
            sender_metrics.record_dropped();
            tracing::trace!(from = %from, to = %to, "message dropped: peer disconnected");
            return Ok(());
        }

        let (latency, loss_rate, jitter) = state.effective_link_config(from, to);

        if loss_rate > 0.0 && state.rng.random_bool(loss_rate.clamp(0.0, 1.0)) {
            sender_metrics.record_dropped();
            tracing::trace!(from = %from, to = %to, "message dropped by loss simulation");
            return Ok(());
        }

        sender_metrics.record_sent(data.len());

        let event = LinkEvent::Message {
            peer: from.clone(),
            data,
        };

        if jitter > Duration::ZERO {
            // Jittered messages bypass the ordered pipe and may overtake
            // each other.
            let jitter_ns = state.rng.random_range(0..jitter.as_nanos() as u64);
            let delay = latency + Duration::from_nanos(jitter_ns);
            if let Some(events) = state.endpoints.get(to).cloned() {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(event);
                });
            }
            return Ok(());
        }

        if let Some(pipe) = state.links.get(&key) {
            let _ = pipe.tx.send((Instant::now() + latency, event));
        }
        Ok(())
    }

    /// Tear down both directions of a link. The remote side sees `Closed`
    /// after any messages already in flight.
    pub(crate) fn close_link(&self, from: &PeerId, to: &PeerId) {
        let mut state = self.state();
        let forward = state.links.remove(&(from.clone(), to.clone()));
        state.links.remove(&(to.clone(), from.clone()));

        if let Some(pipe) = forward {
            let latency = state.effective_link_config(from, to).0;
            let _ = pipe.tx.send((
                Instant::now() + latency,
                LinkEvent::Closed { peer: from.clone() },
            ));
            tracing::info!(from = %from, to = %to, "sim link closed");
        }
    }
}

impl SimState {
    fn effective_link_config(&self, from: &PeerId, to: &PeerId) -> (Duration, f64, Duration) {
        let config = self.link_configs.get(&(from.clone(), to.clone()));
        (
            config
                .and_then(|c| c.latency)
                .unwrap_or(self.default_latency),
            config
                .and_then(|c| c.loss_rate)
                .unwrap_or(self.default_loss_rate),
            config.and_then(|c| c.jitter).unwrap_or(self.default_jitter),
        )
    }

    /// Drop both directions of a link, notifying each side with `event_for`.
    fn sever(&mut self, a: &PeerId, b: &PeerId, event_for: impl Fn(&PeerId) -> LinkEvent) -> bool {
        let ab = self.links.remove(&(a.clone(), b.clone()));
        let ba = self.links.remove(&(b.clone(), a.clone()));
        if ab.is_none() && ba.is_none() {
            return false;
        }
        let now = Instant::now();
        if let Some(pipe) = ab {
            let _ = pipe.tx.send((now, event_for(a)));
        }
        if let Some(pipe) = ba {
            let _ = pipe.tx.send((now, event_for(b)));
        }
        true
    }
}

/// Forward events to `target` in order, each no earlier than its deadline.
fn spawn_pipe(target: mpsc::UnboundedSender<LinkEvent>) -> LinkPipe {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Instant, LinkEvent)>();
    tokio::spawn(async move {
        while let Some((deliver_at, event)) = rx.recv().await {
            tokio::time::sleep_until(deliver_at).await;
            if target.send(event).is_err() {
                break;
            }
        }
    });
    LinkPipe { tx }
}

/// Simulation network controller.
///
/// Registers simulated peers, carries messages between them, and controls
/// network conditions (latency, loss, jitter, disconnection). Links must be
/// opened from within a Tokio runtime.
pub struct SimNetwork {
    inner: Arc<SimNetworkInner>,
}

impl SimNetwork {
    /// Create a new simulation network with default seed (42).
    pub fn new() -> Self {
        Self::with_seed(42)
    }

    /// Create a new simulation network with a specific RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        tracing::info!(seed, "created sim network");
        Self {
            inner: Arc::new(SimNetworkInner {
                state: Mutex::new(SimState {
                    endpoints: HashMap::new(),
                    links: HashMap::new(),
                    link_configs: HashMap::new(),
                    default_latency: Duration::ZERO,
                    default_loss_rate: 0.0,
                    default_jitter: Duration::ZERO,
                    disconnected: HashSet::new(),
                    rng: StdRng::seed_from_u64(seed),
                }),
            }),
        }
    }

    /// Register a peer under `name`, returning its transport and event stream.
    pub fn create_peer(&self, name: &str) -> Result<SimPeer> {
        let id = PeerId::new(name);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        {
            let mut state = self.inner.state();
            if state.endpoints.contains_key(&id) {
                bail!("sim peer {id} already exists");
            }
            state.endpoints.insert(id.clone(), events_tx);
        }
        tracing::info!(peer = %id, "created sim peer");

        let transport = SimTransport::new(id, self.inner.clone(), Arc::new(TransportMetrics::new()));
        Ok(SimPeer::new(transport, events_rx))
    }

    /// Set the default one-way latency for all links.
    pub fn set_latency(&self, duration: Duration) {
        self.inner.state().default_latency = duration;
        tracing::debug!(?duration, "set default latency");
    }

    /// Set latency for a specific link (bidirectional).
    pub fn set_latency_between(&self, a: &PeerId, b: &PeerId, duration: Duration) {
        let mut state = self.inner.state();
        state
            .link_configs
            .entry((a.clone(), b.clone()))
            .or_default()
            .latency = Some(duration);
        state
            .link_configs
            .entry((b.clone(), a.clone()))
            .or_default()
            .latency = Some(duration);
        tracing::debug!(a = %a, b = %b, ?duration, "set link latency");
    }

    /// Set the default message loss rate for all links (0.0–1.0).
    pub fn set_loss_rate(&self, rate: f64) {
        self.inner.state().default_loss_rate = rate;
        tracing::debug!(rate, "set default loss rate");
    }

    /// Set loss rate for a specific link (bidirectional).
    pub fn set_loss_rate_between(&self, a: &PeerId, b: &PeerId, rate: f64) {
        let mut state = self.inner.state();
        state
            .link_configs
            .entry((a.clone(), b.clone()))
            .or_default()
            .loss_rate = Some(rate);
        state
            .link_configs
            .entry((b.clone(), a.clone()))
            .or_default()
            .loss_rate = Some(rate);
        tracing::debug!(a = %a, b = %b, rate, "set link loss rate");
    }

    /// Set the default maximum jitter for all links. Non-zero jitter
    /// allows messages on a link to be reordered.
    pub fn set_jitter(&self, max_jitter: Duration) {
        self.inner.state().default_jitter = max_jitter;
        tracing::debug!(?max_jitter, "set default jitter");
    }

    /// Simulate a peer going offline: its links stay open but all traffic
    /// to or from it is dropped.
    pub fn disconnect(&self, peer: &PeerId) {
        self.inner.state().disconnected.insert(peer.clone());
        tracing::info!(peer = %peer, "sim peer disconnected");
    }

    /// Simulate a peer coming back online.
    pub fn reconnect(&self, peer: &PeerId) {
        self.inner.state().disconnected.remove(peer);
        tracing::info!(peer = %peer, "sim peer reconnected");
    }

    /// Drop the link between `a` and `b`; both sides see `Closed`.
    pub fn sever(&self, a: &PeerId, b: &PeerId) -> bool {
        let severed = self
            .inner
            .state()
            .sever(a, b, |from| LinkEvent::Closed { peer: from.clone() });
        if severed {
            tracing::info!(a = %a, b = %b, "sim link severed");
        }
        severed
    }

    /// Fail the link between `a` and `b`; both sides see `Error`.
    pub fn fail_link(&self, a: &PeerId, b: &PeerId, error: &str) -> bool {
        let failed = self.inner.state().sever(a, b, |from| LinkEvent::Error {
            peer: from.clone(),
            error: error.to_string(),
        });
        if failed {
            tracing::info!(a = %a, b = %b, error, "sim link failed");
        }
        failed
    }

    /// Whether a link from `a` to `b` is currently open.
    pub fn is_linked(&self, a: &PeerId, b: &PeerId) -> bool {
        self.inner
            .state()
            .links
            .contains_key(&(a.clone(), b.clone()))
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

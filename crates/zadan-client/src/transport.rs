//! The transport adapter: one persistent bidirectional link per thread
//! context, surfaced as typed events on a broadcast channel.
//!
//! [`ThreadTransport`] is the seam the connection manager drives. Two
//! implementations ship here:
//!
//! - [`NullTransport`] — the substitution used when no realtime endpoint is
//!   resolvable. Every method is safe to call and no event is ever produced.
//!   Callers must not special-case it; the rest of the store simply never
//!   hears a push event.
//! - [`ChannelTransport`] — an in-memory duplex. Tests drive it directly,
//!   and embedders bridge a real socket through the paired
//!   [`TransportHarness`] (forward inbound frames with
//!   [`TransportHarness::push_server`], drain outbound joins/leaves from
//!   [`TransportHarness::outbound`]).

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::events::{ClientEvent, ServerEvent};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection-layer failures, classified for the reconnect policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The namespace/endpoint configuration is wrong. Retrying cannot help;
    /// this must not be surfaced as a transient drop.
    #[error("realtime namespace rejected: {0}")]
    Namespace(String),
    /// Transient connection failure — the reconnect policy owns these.
    #[error("connection failed: {0}")]
    Connection(String),
}

impl TransportError {
    /// Configuration-fatal errors are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Namespace(_))
    }
}

/// Why the link went down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// A deliberate local `disconnect()` — no auto-reconnect.
    Manual,
    /// The link dropped underneath us.
    Lost,
}

/// Everything a transport reports upward.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: DisconnectReason },
    ConnectFailed(TransportError),
    Server(ServerEvent),
}

/// A persistent link to the `/threads` realtime namespace.
pub trait ThreadTransport: Send {
    /// Establish (or confirm) the link. Idempotent: a second call on a live
    /// link must not create a second socket — that would double event
    /// delivery. Outcomes beyond immediate rejection arrive as
    /// [`TransportEvent::Connected`] / [`TransportEvent::ConnectFailed`].
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Tear the link down deliberately.
    fn disconnect(&mut self);

    /// Send a coordination event. Silently dropped while disconnected.
    fn emit(&mut self, event: ClientEvent);

    /// Subscribe to the transport's event stream.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    fn is_connected(&self) -> bool;
}

/// Resolve a transport for an optionally-configured realtime endpoint.
///
/// No URL (or a blank one) substitutes the null adapter — callers get a
/// fully functional transport that simply never produces events, not an
/// error path to special-case. With a URL, `bridge` builds the real link
/// (typically a [`ChannelTransport`] fed by the embedder's socket).
pub fn transport_for_url(
    url: Option<&str>,
    bridge: impl FnOnce(&str) -> Box<dyn ThreadTransport>,
) -> Box<dyn ThreadTransport> {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => bridge(url),
        None => NullTransport::boxed(),
    }
}

// ============================================================================
// Null transport
// ============================================================================

/// The no-op substitution for "no service URL resolvable".
pub struct NullTransport {
    // Kept alive so subscribers get a valid (permanently silent) stream.
    events: broadcast::Sender<TransportEvent>,
}

impl NullTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        tracing::warn!("no realtime endpoint configured; push events disabled");
        Self { events }
    }

    pub fn boxed() -> Box<dyn ThreadTransport> {
        Box::new(Self::new())
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadTransport for NullTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn emit(&mut self, _event: ClientEvent) {}

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        false
    }
}

// ============================================================================
// Channel transport
// ============================================================================

/// In-memory duplex transport. The paired [`TransportHarness`] plays the
/// server side.
pub struct ChannelTransport {
    connected: bool,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    events: broadcast::Sender<TransportEvent>,
}

/// Server-side handle for a [`ChannelTransport`].
pub struct TransportHarness {
    /// Coordination events the client emitted.
    pub outbound: mpsc::UnboundedReceiver<ClientEvent>,
    events: broadcast::Sender<TransportEvent>,
}

impl ChannelTransport {
    /// Create a connected pair: the client-side transport and the harness
    /// that injects events into it.
    pub fn pair() -> (Self, TransportHarness) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let transport = Self {
            connected: false,
            outbound: outbound_tx,
            events: events.clone(),
        };
        let harness = TransportHarness {
            outbound: outbound_rx,
            events,
        };
        (transport, harness)
    }
}

impl ThreadTransport for ChannelTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            // Guard against duplicate event delivery: one live connection
            // per adapter instance.
            return Ok(());
        }
        self.connected = true;
        let _ = self.events.send(TransportEvent::Connected);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            let _ = self.events.send(TransportEvent::Disconnected {
                reason: DisconnectReason::Manual,
            });
        }
    }

    fn emit(&mut self, event: ClientEvent) {
        if !self.connected {
            tracing::debug!("emit while disconnected, dropping {event:?}");
            return;
        }
        let _ = self.outbound.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl TransportHarness {
    /// Inject a raw transport event (drop, connect error, reconnect).
    pub fn push(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Inject a server push event.
    pub fn push_server(&self, event: ServerEvent) {
        self.push(TransportEvent::Server(event));
    }

    /// Next coordination event the client emitted, if any.
    pub fn try_next_emitted(&mut self) -> Option<ClientEvent> {
        self.outbound.try_recv().ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Connection lifecycle: join/leave semantics, automatic rejoin after a
//! drop, and bounded reconnection.
//!
//! # State Machine
//!
//! ```text
//! +--------------+  connect ok   +-----------+  join-thread   +--------+
//! | Disconnected | ────────────▶ | Connected | ─────────────▶ | Joined |
//! +--------------+               +-----------+                +--------+
//!        ▲                                                        │
//!        │ manual disconnect          non-manual drop             │
//!        └────────────────────────────────────────────────────────┤
//!                                                                 ▼
//!                       connect event: replay stored      +--------------+
//!                       (thread, user, name) triple   ◀── | Reconnecting |
//!                                                         +------┬-------+
//!                                                                │ attempts
//!                                                                ▼ exhausted
//!                                                           +--------+
//!                                                           | Failed |  (terminal until retry())
//!                                                           +--------+
//! ```
//!
//! A configuration-fatal connect error (bad namespace) goes straight to
//! `Failed` without a reconnecting phase, so the UI can distinguish it from
//! a transient drop. Join/leave emit bare coordination events only — the
//! manager never fetches or mutates post data; after a rejoin the store's
//! last known tree simply stays current.

use zadan_types::{ThreadId, UserId};

use crate::events::ClientEvent;
use crate::transport::{DisconnectReason, ThreadTransport, TransportError, TransportEvent};

/// Fixed reconnect ceiling. The reference behavior retries a flat number of
/// times without backoff before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Where the connection currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Joined,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted or configuration rejected — stays here
    /// until a manual [`ConnectionManager::retry`].
    Failed,
}

/// The identity triple replayed on rejoin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinIdentity {
    pub thread_id: ThreadId,
    pub user_id: UserId,
    pub user_name: String,
}

/// Owns one transport and drives the join/leave/rejoin lifecycle.
///
/// Explicitly constructed and injected — whatever component manages thread
/// lifetime owns an instance, and tests instantiate as many as they like.
pub struct ConnectionManager {
    transport: Box<dyn ThreadTransport>,
    state: ConnectionState,
    /// Last joined identity, kept for automatic rejoin. Cleared only by an
    /// intentional [`leave_thread`](Self::leave_thread).
    joined: Option<JoinIdentity>,
    last_error: Option<TransportError>,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn ThreadTransport>) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            joined: None,
            last_error: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The "reconnecting" UI indicator. Configuration-fatal failures never
    /// set this.
    pub fn is_reconnecting(&self) -> bool {
        matches!(self.state, ConnectionState::Reconnecting { .. })
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    /// The identity that will be replayed on the next connect event.
    pub fn joined_identity(&self) -> Option<&JoinIdentity> {
        self.joined.as_ref()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TransportEvent> {
        self.transport.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Establish the link. Safe to call while already connected.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        match self.transport.connect() {
            Ok(()) => {
                if self.transport.is_connected()
                    && matches!(
                        self.state,
                        ConnectionState::Disconnected | ConnectionState::Failed
                    )
                {
                    self.state = ConnectionState::Connected;
                }
                Ok(())
            }
            Err(e) => {
                self.record_connect_failure(&e);
                Err(e)
            }
        }
    }

    /// Deliberate teardown. The stored identity survives — a later
    /// `connect()` rejoins; only `leave_thread()` forgets it.
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        self.state = ConnectionState::Disconnected;
    }

    /// Announce membership in a thread and remember the triple for rejoin.
    pub fn join_thread(&mut self, identity: JoinIdentity) {
        if self.transport.is_connected() {
            self.transport.emit(ClientEvent::JoinThread {
                thread_id: identity.thread_id,
                user_id: identity.user_id,
                user_name: identity.user_name.clone(),
            });
            self.state = ConnectionState::Joined;
        }
        // Stored regardless: if we're mid-reconnect the join replays on the
        // next Connected event.
        self.joined = Some(identity);
    }

    /// Intentional leave — clears the stored identity so no auto-rejoin
    /// happens afterwards.
    pub fn leave_thread(&mut self) {
        if let Some(identity) = self.joined.take() {
            if self.transport.is_connected() {
                self.transport.emit(ClientEvent::LeaveThread {
                    thread_id: identity.thread_id,
                    user_id: identity.user_id,
                });
            }
            if self.state == ConnectionState::Joined {
                self.state = ConnectionState::Connected;
            }
        }
    }

    /// Manual retry out of `Failed`.
    pub fn retry(&mut self) -> Result<(), TransportError> {
        self.state = ConnectionState::Disconnected;
        self.last_error = None;
        self.connect()
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Feed one transport event through the state machine. The store's event
    /// pump calls this for every event, in delivery order.
    pub fn handle_event(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.last_error = None;
                match &self.joined {
                    Some(identity) => {
                        tracing::info!(
                            "rejoining thread {} as {}",
                            identity.thread_id,
                            identity.user_name
                        );
                        self.transport.emit(ClientEvent::JoinThread {
                            thread_id: identity.thread_id,
                            user_id: identity.user_id,
                            user_name: identity.user_name.clone(),
                        });
                        self.state = ConnectionState::Joined;
                    }
                    None => self.state = ConnectionState::Connected,
                }
            }

            TransportEvent::Disconnected { reason } => match reason {
                DisconnectReason::Manual => {
                    self.state = ConnectionState::Disconnected;
                }
                DisconnectReason::Lost => {
                    tracing::warn!("connection lost, reconnecting (attempt 1)");
                    self.state = ConnectionState::Reconnecting { attempt: 1 };
                    if let Err(e) = self.transport.connect() {
                        self.record_connect_failure(&e);
                    }
                }
            },

            TransportEvent::ConnectFailed(e) => self.record_connect_failure(e),

            // Server payloads belong to the reconciler.
            TransportEvent::Server(_) => {}
        }
    }

    fn record_connect_failure(&mut self, error: &TransportError) {
        self.last_error = Some(error.clone());
        if error.is_fatal() {
            tracing::error!("realtime configuration error, not retrying: {error}");
            self.state = ConnectionState::Failed;
            return;
        }
        match self.state {
            ConnectionState::Reconnecting { attempt } if attempt >= MAX_RECONNECT_ATTEMPTS => {
                tracing::error!("reconnect attempts exhausted ({attempt}), giving up");
                self.state = ConnectionState::Failed;
            }
            ConnectionState::Reconnecting { attempt } => {
                let next = attempt + 1;
                tracing::warn!("reconnect failed, retrying (attempt {next})");
                self.state = ConnectionState::Reconnecting { attempt: next };
                if let Err(e) = self.transport.connect() {
                    self.record_connect_failure(&e);
                }
            }
            _ => {
                self.state = ConnectionState::Reconnecting { attempt: 1 };
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

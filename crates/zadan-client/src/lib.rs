//! Client-side synchronization engine for nested discussion threads.
//!
//! The embedding application owns one [`DiscussionStore`] per discussion
//! surface. User actions go through the store's async methods (optimistic
//! local mutation, then REST confirmation with rollback on failure); push
//! events arriving over the realtime transport are drained with
//! [`DiscussionStore::pump_events`] and reconciled against the optimistic
//! state without duplication or loss.
//!
//! ```text
//!   UI action ──▶ DiscussionStore ──▶ optimistic tree mutation
//!                      │                      │
//!                      ▼                      ▼
//!               DiscussionApi (REST)    merge / rollback
//!
//!   ThreadTransport ──▶ pump_events ──▶ ConnectionManager (lifecycle)
//!                                  └──▶ reconciler (self-origination
//!                                       filter, idempotent application)
//! ```
//!
//! The REST client and the socket itself are collaborators supplied by the
//! embedder: implement [`DiscussionApi`] over your HTTP stack, and bridge
//! your socket through [`ChannelTransport`] (or pass a [`NullTransport`]
//! when no realtime endpoint is configured — everything still works, just
//! without push updates).

mod api;
mod connection;
mod error;
mod events;
mod persist;
mod reconciler;
mod review;
mod store;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, DiscussionApi, ReviewStatus};
pub use connection::{
    ConnectionManager, ConnectionState, JoinIdentity, MAX_RECONNECT_ATTEMPTS,
};
pub use error::ClientError;
pub use events::{ClientEvent, ServerEvent};
pub use persist::{DurableSession, PersistError, SessionCache};
pub use reconciler::{ApplyOutcome, SkipReason};
pub use review::ReviewGate;
pub use store::{DEFAULT_POST_PAGE_SIZE, DiscussionStore, StoreConfig};
pub use transport::{
    ChannelTransport, DisconnectReason, NullTransport, ThreadTransport, TransportError,
    TransportEvent, TransportHarness, transport_for_url,
};

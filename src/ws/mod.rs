//! Real-time WebSocket link to the printer backend.
//!
//! One [`ConnectionManager`] owns one long-lived connection and keeps it healthy: it detects
//! silent peers with PING keepalives and a read deadline, reconnects with exponential backoff,
//! and holds messages sent while offline in a bounded queue that is flushed on reconnect.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: state machine and public API
//! - [`EventHandlers`]: replaceable callbacks for state changes, payloads and errors
//! - [`Config`]: timeouts, queue sizes, keepalive and backoff tuning
//!
//! Internally each connection generation runs a read loop and a write loop; a single reconnect
//! loop takes over whenever the link is lost.

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub(crate) mod io;
pub(crate) mod queue;
pub(crate) mod reconnect;
pub mod state;

pub use config::{Config, KeepaliveConfig, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionStats, DEFAULT_ENDPOINT, SendOutcome};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use events::{ConnectionListener, EventHandlers};
pub use state::ConnectionState;

#![expect(
    clippy::module_name_repetitions,
    reason = "ConnectionState is re-exported from the ws module and read better with the suffix"
)]

use std::fmt;

use serde::Serialize;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Handshake in flight
    Connecting,
    /// Successfully connected
    Connected,
    /// Waiting out the backoff before the next connection attempt
    Reconnecting,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Display name, as shown on the status card.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

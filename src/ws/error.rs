#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::error::Kind;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// The backend refused the upgrade because of the bearer credential
    AuthenticationFailed {
        /// HTTP status returned on the upgrade response
        status: StatusCode,
    },
    /// The handshake did not finish within `connect_timeout`
    ConnectTimeout,
    /// No hand-off slot freed up within `send_timeout`; the message was dropped
    SendTimeout,
    /// A frame could not be written within `write_timeout`
    WriteTimeout,
    /// Nothing arrived from the peer within the keepalive deadline
    KeepaliveTimeout,
    /// WebSocket connection was closed
    ConnectionClosed,
    /// An outbound message could not be serialized
    Serialize(serde_json::Error),
}

impl WsError {
    /// The crate-level [`Kind`] this variant is reported as.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::AuthenticationFailed { .. } => Kind::Authentication,
            Self::ConnectTimeout
            | Self::SendTimeout
            | Self::WriteTimeout
            | Self::KeepaliveTimeout => Kind::Timeout,
            Self::Serialize(_) => Kind::Internal,
            Self::Connection(_) | Self::ConnectionClosed => Kind::WebSocket,
        }
    }

    /// Classifies a failed dial. A `401 Unauthorized` on the upgrade response is an
    /// authentication rejection, everything else is a transport failure.
    pub(crate) fn from_dial(e: tokio_tungstenite::tungstenite::Error) -> Self {
        if let tokio_tungstenite::tungstenite::Error::Http(response) = &e
            && response.status() == StatusCode::UNAUTHORIZED
        {
            return Self::AuthenticationFailed {
                status: response.status(),
            };
        }
        Self::Connection(e)
    }
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::AuthenticationFailed { status } => {
                write!(f, "WebSocket authentication failed ({status})")
            }
            Self::ConnectTimeout => write!(f, "WebSocket handshake timed out"),
            Self::SendTimeout => write!(f, "send timeout"),
            Self::WriteTimeout => write!(f, "WebSocket write timed out"),
            Self::KeepaliveTimeout => write!(f, "no frames received within keepalive deadline"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::Serialize(e) => write!(f, "Failed to serialize outbound message: {e}"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(e.kind(), e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        WsError::Connection(e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_timeout_kind() {
        let error: crate::error::Error = WsError::SendTimeout.into();

        assert_eq!(error.kind(), Kind::Timeout);
        assert_eq!(error.to_string(), "Timeout: send timeout");
    }

    #[test]
    fn authentication_failure_maps_to_authentication_kind() {
        let error: crate::error::Error = WsError::AuthenticationFailed {
            status: StatusCode::UNAUTHORIZED,
        }
        .into();

        assert!(error.is_authentication());
        assert!(error.to_string().contains("401"));
    }

    #[test]
    fn closed_connection_is_transport_failure() {
        assert_eq!(WsError::ConnectionClosed.kind(), Kind::WebSocket);
        assert_eq!(WsError::KeepaliveTimeout.kind(), Kind::Timeout);
    }
}

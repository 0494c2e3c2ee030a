#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Path of the backend's WebSocket route.
const WS_PATH: &str = "/ws";

/// Builds the WebSocket endpoint for a backend reachable at `base`.
///
/// `base` is usually a bare `host:port` as found by printer discovery, in which case the result
/// is `ws://{base}/ws`. An `http` or `https` base maps to `ws` or `wss` respectively, and a base
/// already pointing at the `/ws` route is not extended again.
#[must_use]
pub fn ws_endpoint(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let (scheme, authority) = match base.split_once("://") {
        Some(("https" | "wss", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", base),
    };

    if authority.ends_with(WS_PATH) {
        format!("{scheme}://{authority}")
    } else {
        format!("{scheme}://{authority}{WS_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_ws_scheme_and_path() {
        assert_eq!(ws_endpoint("localhost:8080"), "ws://localhost:8080/ws");
        assert_eq!(ws_endpoint("192.168.1.40:8080/"), "ws://192.168.1.40:8080/ws");
    }

    #[test]
    fn http_schemes_map_to_websocket_schemes() {
        assert_eq!(ws_endpoint("http://printer.local"), "ws://printer.local/ws");
        assert_eq!(
            ws_endpoint("https://printer.example.com"),
            "wss://printer.example.com/ws"
        );
    }

    #[test]
    fn existing_websocket_route_is_kept() {
        assert_eq!(ws_endpoint("wss://printer.local/ws"), "wss://printer.local/ws");
        assert_eq!(ws_endpoint("ws://printer.local:8080/ws/"), "ws://printer.local:8080/ws");
    }

    #[test]
    fn endpoint_is_accepted_by_manager() {
        let manager: ws::ConnectionManager =
            ws::ConnectionManager::with_defaults(&ws_endpoint("localhost:8080")).unwrap();

        assert_eq!(manager.endpoint(), "ws://localhost:8080/ws");
    }
}

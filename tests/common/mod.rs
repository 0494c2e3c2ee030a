#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use printer_realtime::ws::ConnectionState;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

/// How the mock backend treats an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads client frames, answering PINGs, and pushes whatever [`MockWsServer::push`] sends
    Responsive,
    /// Completes the handshake, then never reads or writes again
    Silent,
}

/// Mock printer backend speaking WebSocket on a random loopback port.
pub struct MockWsServer {
    pub addr: SocketAddr,
    /// Text frames pushed to every connected client
    push_tx: broadcast::Sender<String>,
    /// Closes every live connection with a Close frame
    kick_tx: broadcast::Sender<()>,
    /// Text frames received from clients
    received_rx: mpsc::UnboundedReceiver<String>,
    /// `Authorization` header of every upgrade request, accepted or not
    handshake_rx: mpsc::UnboundedReceiver<Option<String>>,
    /// Bearer token the upgrade must carry; `None` accepts anyone
    required_token: Arc<Mutex<Option<String>>>,
}

impl MockWsServer {
    pub async fn start() -> Self {
        Self::start_with(Mode::Responsive).await
    }

    pub async fn start_with(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (push_tx, _) = broadcast::channel::<String>(100);
        let (kick_tx, _) = broadcast::channel::<()>(4);
        let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
        let (handshake_tx, handshake_rx) = mpsc::unbounded_channel::<Option<String>>();
        let required_token = Arc::new(Mutex::new(None::<String>));

        let push = push_tx.clone();
        let kick = kick_tx.clone();
        let required = Arc::clone(&required_token);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let handshake_tx = handshake_tx.clone();
                let expected = required.lock().unwrap().clone();
                let callback = move |request: &Request, response: Response| {
                    let authorization = request
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_owned);
                    drop(handshake_tx.send(authorization.clone()));

                    match expected {
                        Some(token)
                            if authorization.as_deref()
                                != Some(format!("Bearer {token}").as_str()) =>
                        {
                            let mut rejection = ErrorResponse::new(None);
                            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
                            Err(rejection)
                        }
                        _ => Ok(response),
                    }
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                else {
                    continue;
                };

                let mut kick_rx = kick.subscribe();
                if mode == Mode::Silent {
                    tokio::spawn(async move {
                        let _held = ws_stream;
                        drop(kick_rx.recv().await);
                    });
                    continue;
                }

                let (mut write, mut read) = ws_stream.split();
                let received_tx = received_tx.clone();
                let mut push_rx = push.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(received_tx.send(text.to_string()));
                                    }
                                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                            msg = push_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                                    Err(broadcast::error::RecvError::Closed) => break,
                                }
                            }
                            _ = kick_rx.recv() => {
                                drop(write.send(Message::Close(None)).await);
                                break;
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            push_tx,
            kick_tx,
            received_rx,
            handshake_rx,
            required_token,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Require `Authorization: Bearer {token}` on subsequent upgrades.
    pub fn require_token(&self, token: &str) {
        *self.required_token.lock().unwrap() = Some(token.to_owned());
    }

    /// Push a text frame to every connected client.
    pub fn push(&self, text: &str) {
        drop(self.push_tx.send(text.to_owned()));
    }

    /// Close every live connection from the server side.
    pub fn kick(&self) {
        drop(self.kick_tx.send(()));
    }

    /// Next text frame received from a client, or `None` after two seconds.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.received_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// `Authorization` header of the next upgrade request, or `None` after two seconds.
    pub async fn next_handshake(&mut self) -> Option<Option<String>> {
        timeout(Duration::from_secs(2), self.handshake_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Number of upgrade requests seen so far and not yet consumed.
    pub fn pending_handshakes(&mut self) -> usize {
        let mut count = 0;
        while self.handshake_rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

/// Waits until the manager reports `target`, giving up after `limit`.
pub async fn wait_for_state(
    states: &mut watch::Receiver<ConnectionState>,
    target: ConnectionState,
    limit: Duration,
) -> bool {
    timeout(limit, states.wait_for(|state| *state == target))
        .await
        .is_ok_and(|result| result.is_ok())
}

#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use bytes::Bytes;
use futures::StreamExt as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::events::EventHandlers;
use super::io;
use super::queue::PendingQueue;
use super::reconnect;
use super::state::ConnectionState;
use crate::Result;
use crate::error::{Error, ErrorSnapshot, Kind};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for inbound payloads.
const BROADCAST_CAPACITY: usize = 1024;

/// Endpoint used by [`ConnectionManager::default`]: the backend's WebSocket route on the local
/// machine.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Result of [`ConnectionManager::send`].
///
/// Not connected is not a failure: the message is retained and goes out with the next
/// successful connection.
#[non_exhaustive]
#[derive(Debug)]
#[must_use]
pub enum SendOutcome {
    /// Handed to the write loop of the live connection
    Delivered,
    /// Appended to the pending queue because no connection is live
    Queued,
    /// Dropped. The caller must resubmit if the message still matters
    Rejected(Error),
}

impl SendOutcome {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Point-in-time view of the manager for status displays.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub queue_len: usize,
    pub reconnect_attempts: u32,
    pub last_error: Option<ErrorSnapshot>,
}

impl ConnectionStats {
    /// Short detail line for the status card, e.g. `"Queue: 3 Attempts: 2"`. Zero counts are
    /// left out, so a healthy link yields an empty string.
    #[must_use]
    pub fn details(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if self.queue_len > 0 {
            parts.push(format!("Queue: {}", self.queue_len));
        }
        if self.reconnect_attempts > 0 {
            parts.push(format!("Attempts: {}", self.reconnect_attempts));
        }
        parts.join(" ")
    }
}

impl fmt::Display for ConnectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State: {} | Queue: {} messages | Reconnect Attempts: {}",
            self.state, self.queue_len, self.reconnect_attempts
        )
    }
}

/// The live half of a connection generation, as seen by the manager.
///
/// The socket itself is split between the read and write loops of the same generation; the
/// manager only keeps the token that closes it and the hand-off sender that feeds it.
pub(crate) struct Link<M> {
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
    pub(crate) outbound: mpsc::Sender<M>,
}

/// Everything guarded by the state lock.
pub(crate) struct Status<M> {
    pub(crate) state: ConnectionState,
    pub(crate) reconnect_enabled: bool,
    pub(crate) reconnect_attempts: u32,
    pub(crate) last_error: Option<ErrorSnapshot>,
    pub(crate) link: Option<Link<M>>,
}

pub(crate) struct Inner<M> {
    pub(crate) endpoint: String,
    pub(crate) config: Config,
    status: RwLock<Status<M>>,
    /// Separate from `status`; never held together with it
    queue: Mutex<PendingQueue<M>>,
    auth_token: RwLock<Option<SecretString>>,
    pub(crate) handlers: EventHandlers,
    state_tx: watch::Sender<ConnectionState>,
    inbound_tx: broadcast::Sender<Bytes>,
    /// Serializes handshakes
    connect_lock: tokio::sync::Mutex<()>,
    /// Serializes queue flushes
    pub(crate) flush_lock: tokio::sync::Mutex<()>,
    /// Observed by every loop; replaced by `connect` after `disconnect` cancelled it
    shutdown: Mutex<CancellationToken>,
    /// Single-slot reconnect trigger
    pub(crate) reconnect_active: AtomicBool,
    /// Wakes a reconnect loop waiting out its backoff
    pub(crate) reconnect_wake: Notify,
    generation: AtomicU64,
}

impl<M> Inner<M>
where
    M: Serialize + Send + 'static,
{
    fn new(endpoint: String, config: Config) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (inbound_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            endpoint,
            status: RwLock::new(Status {
                state: ConnectionState::Disconnected,
                reconnect_enabled: true,
                reconnect_attempts: 0,
                last_error: None,
                link: None,
            }),
            queue: Mutex::new(PendingQueue::new(config.queue_capacity)),
            auth_token: RwLock::new(None),
            handlers: EventHandlers::new(),
            state_tx,
            inbound_tx,
            connect_lock: tokio::sync::Mutex::new(()),
            flush_lock: tokio::sync::Mutex::new(()),
            shutdown: Mutex::new(CancellationToken::new()),
            reconnect_active: AtomicBool::new(false),
            reconnect_wake: Notify::new(),
            generation: AtomicU64::new(0),
            config,
        }
    }

    pub(crate) fn status(&self) -> RwLockReadGuard<'_, Status<M>> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue(&self) -> MutexGuard<'_, PendingQueue<M>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs a fresh shutdown token if `disconnect` cancelled the current one.
    fn arm_shutdown(&self) -> CancellationToken {
        let mut shutdown = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner);
        if shutdown.is_cancelled() {
            *shutdown = CancellationToken::new();
        }
        shutdown.clone()
    }

    /// Mutates the status under the state lock and, if the state value changed, publishes the
    /// new value and invokes the on-state-change handler once the lock is released.
    pub(crate) fn update<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Status<M>) -> R,
    {
        let (result, changed) = {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            let before = status.state;
            let result = f(&mut status);
            let after = status.state;
            if before != after {
                self.state_tx.send_replace(after);
            }
            (result, (before != after).then_some(after))
        };

        if let Some(state) = changed {
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %self.endpoint, %state, "connection state changed");
            self.handlers.state_changed(state);
        }

        result
    }

    pub(crate) fn should_reconnect(&self) -> bool {
        let status = self.status();
        status.reconnect_enabled && status.state == ConnectionState::Disconnected
    }

    pub(crate) fn enqueue(&self, message: M) {
        let evicted = self.queue().push_back(message);
        if evicted.is_some() {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                capacity = self.config.queue_capacity,
                "pending queue full, dropped oldest message"
            );
        }
    }

    pub(crate) fn dequeue(&self) -> Option<M> {
        self.queue().pop_front()
    }

    pub(crate) fn requeue_front(&self, message: M) {
        if self.queue().push_front(message).is_some() {
            #[cfg(feature = "tracing")]
            tracing::debug!("pending queue refilled during flush, dropped unsent message");
        }
    }

    fn queue_len(&self) -> usize {
        self.queue().len()
    }

    /// Hand-off sender of the live connection, if there is one.
    fn live_outbound(&self) -> Option<mpsc::Sender<M>> {
        let status = self.status();
        if status.state.is_connected() {
            status.link.as_ref().map(|link| link.outbound.clone())
        } else {
            None
        }
    }

    /// Queues `message` for the next connection.
    ///
    /// A connection may have come up, and flushed, after the caller last saw the state, so the
    /// state is checked again once the message is in the queue.
    pub(crate) async fn retain(self: &Arc<Self>, message: M) -> SendOutcome {
        self.enqueue(message);

        if let Some(outbound) = self.live_outbound() {
            io::flush_queue(self, &outbound).await;
        } else if self.should_reconnect() {
            reconnect::trigger(self);
        }
        SendOutcome::Queued
    }

    /// Forwards an inbound payload verbatim, in arrival order.
    pub(crate) fn deliver(&self, payload: Bytes) {
        self.handlers.message(&payload);
        _ = self.inbound_tx.send(payload);
    }

    fn handshake_request(&self) -> Result<Request> {
        let mut request = self.endpoint.as_str().into_client_request()?;

        let token = self
            .auth_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error::with_source(Kind::Validation, e))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }

    async fn dial(&self, request: Request) -> std::result::Result<WsStream, WsError> {
        match timeout(self.config.connect_timeout, connect_async(request)).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(e)) => Err(WsError::from_dial(e)),
            Err(_elapsed) => Err(WsError::ConnectTimeout),
        }
    }

    pub(crate) async fn connect(self: &Arc<Self>) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        if self.status().state.is_connected() {
            return Ok(());
        }

        let shutdown = self.arm_shutdown();
        let request = match self.handshake_request() {
            Ok(request) => request,
            Err(e) => {
                self.update(|status| status.last_error = Some(ErrorSnapshot::from(&e)));
                self.handlers.error(&e);
                return Err(e);
            }
        };

        self.update(|status| status.state = ConnectionState::Connecting);

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, "dialing");

        match self.dial(request).await {
            Ok(stream) => {
                let Some(outbound) = self.establish(stream, &shutdown) else {
                    // `disconnect` ran while the handshake was in flight
                    return Err(WsError::ConnectionClosed.into());
                };
                io::flush_queue(self, &outbound).await;
                Ok(())
            }
            Err(e) => Err(self.connect_failed(e)),
        }
    }

    /// Installs a freshly dialed stream as the next generation and starts its loops.
    fn establish(
        self: &Arc<Self>,
        stream: WsStream,
        shutdown: &CancellationToken,
    ) -> Option<mpsc::Sender<M>> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let cancel = shutdown.child_token();
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.handoff_capacity.max(1));

        let installed = self.update(|status| {
            if shutdown.is_cancelled() {
                return false;
            }
            status.link = Some(Link {
                generation,
                cancel: cancel.clone(),
                outbound: outbound_tx.clone(),
            });
            status.reconnect_attempts = 0;
            status.last_error = None;
            status.state = ConnectionState::Connected;
            true
        });
        if !installed {
            return None;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %self.endpoint, generation, "connected");

        let (sink, source) = stream.split();
        tokio::spawn(io::read_loop(
            Arc::clone(self),
            generation,
            source,
            cancel.clone(),
        ));
        tokio::spawn(io::write_loop(
            Arc::clone(self),
            generation,
            sink,
            outbound_rx,
            cancel,
        ));

        Some(outbound_tx)
    }

    fn connect_failed(self: &Arc<Self>, error: WsError) -> Error {
        let authentication = matches!(error, WsError::AuthenticationFailed { .. });
        let error = Error::from(error);
        let snapshot = ErrorSnapshot::from(&error);

        #[cfg(feature = "tracing")]
        tracing::warn!(endpoint = %self.endpoint, error = %error, "unable to connect");

        let reconnect = self.update(|status| {
            if authentication {
                status.reconnect_enabled = false;
            }
            status.last_error = Some(snapshot);
            status.state = ConnectionState::Disconnected;
            status.reconnect_enabled
        });

        self.handlers.error(&error);
        if reconnect {
            reconnect::trigger(self);
        }

        error
    }

    /// Called by a read or write loop when its connection is gone. Reports from a generation
    /// other than the active one are ignored.
    pub(crate) fn connection_lost(self: &Arc<Self>, generation: u64, error: Option<Error>) {
        let snapshot = error.as_ref().map(ErrorSnapshot::from);

        let current = self.update(|status| {
            if status
                .link
                .as_ref()
                .is_none_or(|link| link.generation != generation)
            {
                return false;
            }
            if let Some(link) = status.link.take() {
                link.cancel.cancel();
            }
            if snapshot.is_some() {
                status.last_error = snapshot;
            }
            status.state = ConnectionState::Disconnected;
            true
        });

        if !current {
            #[cfg(feature = "tracing")]
            tracing::trace!(generation, "ignoring loss report from superseded connection");
            return;
        }

        if let Some(error) = &error {
            #[cfg(feature = "tracing")]
            tracing::warn!(generation, error = %error, "connection lost");
            self.handlers.error(error);
        }

        if self.should_reconnect() {
            reconnect::trigger(self);
        }
    }

    fn disconnect(&self) {
        self.shutdown_token().cancel();
        self.update(|status| {
            status.reconnect_enabled = false;
            if let Some(link) = status.link.take() {
                link.cancel.cancel();
            }
            status.state = ConnectionState::Disconnected;
        });
        self.reconnect_wake.notify_waiters();
    }
}

/// Keeps one long-lived WebSocket link to the backend healthy.
///
/// The manager:
/// - dials the endpoint with an optional bearer credential
/// - forwards inbound payloads verbatim to [`EventHandlers`] and [`Self::subscribe`]
/// - writes outbound messages as JSON text frames and pings the peer on a fixed interval
/// - retains messages sent while offline in a bounded drop-oldest queue and flushes them on
///   the next successful connection
/// - reconnects with exponential backoff after any non-authentication failure
///
/// Clones share the same connection. The connection is closed when the last clone is dropped.
///
/// # Example
///
/// ```no_run
/// use printer_realtime::ws::{ConnectionManager, SendOutcome};
/// use serde_json::json;
///
/// # async fn example() -> printer_realtime::Result<()> {
/// let manager: ConnectionManager = ConnectionManager::with_defaults("ws://printer.local:8080/ws")?;
/// manager.set_auth_token("token-from-login");
/// manager.handlers().set_on_message(|payload| {
///     println!("status update: {}", String::from_utf8_lossy(payload));
/// });
///
/// manager.connect().await?;
///
/// match manager.send(json!({ "type": "subscribe", "topic": "temperatures" })).await {
///     SendOutcome::Delivered | SendOutcome::Queued => {}
///     SendOutcome::Rejected(e) => eprintln!("dropped: {e}"),
///     _ => {}
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<M = serde_json::Value>
where
    M: Serialize + Send + 'static,
{
    inner: Arc<Inner<M>>,
    guard: Arc<DisconnectOnDrop<M>>,
}

/// Disconnects when the last [`ConnectionManager`] clone goes away. The I/O loops hold their own
/// references to the shared state, so without this the socket would outlive every handle.
struct DisconnectOnDrop<M>(Arc<Inner<M>>)
where
    M: Serialize + Send + 'static;

impl<M> Drop for DisconnectOnDrop<M>
where
    M: Serialize + Send + 'static,
{
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

impl<M> Clone for ConnectionManager<M>
where
    M: Serialize + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl Default for ConnectionManager<serde_json::Value> {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_ENDPOINT)
            .expect("ConnectionManager with default endpoint should succeed")
    }
}

impl<M> fmt::Debug for ConnectionManager<M>
where
    M: Serialize + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<M> ConnectionManager<M>
where
    M: Serialize + Send + 'static,
{
    /// Create a manager for `endpoint`. Nothing is dialed until [`Self::connect`] or
    /// [`Self::send`] is called.
    ///
    /// The endpoint must be a `ws://` or `wss://` URL and the reconnect jitter a fraction in
    /// `0.0..=1.0`.
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let url = Url::parse(endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "endpoint scheme must be ws or wss, got {}",
                url.scheme()
            )));
        }

        let jitter = config.reconnect.jitter;
        if !(0.0..=1.0).contains(&jitter) {
            return Err(Error::validation(format!(
                "reconnect jitter must be between 0 and 1, got {jitter}"
            )));
        }

        let inner = Arc::new(Inner::new(endpoint.to_owned(), config));
        Ok(Self {
            guard: Arc::new(DisconnectOnDrop(Arc::clone(&inner))),
            inner,
        })
    }

    /// [`Self::new`] with [`Config::default`].
    pub fn with_defaults(endpoint: &str) -> Result<Self> {
        Self::new(endpoint, Config::default())
    }

    /// Dial the endpoint.
    ///
    /// On success the reconnect counter resets, the read and write loops start and the pending
    /// queue is flushed. Concurrent calls are serialized; a call that finds the link already up
    /// returns `Ok(())` without dialing.
    ///
    /// # Errors
    ///
    /// An error of kind [`Kind::Authentication`] means the backend refused the credential.
    /// Automatic reconnection is then disabled until [`Self::enable_reconnect`] is called,
    /// normally after [`Self::set_auth_token`]. Any other error is transient: if reconnection
    /// is enabled a reconnect loop takes over.
    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    /// Close the link and permanently disable automatic reconnection. Idempotent.
    ///
    /// Stops the read, write and reconnect loops. A later [`Self::connect`] starts over.
    pub fn disconnect(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %self.inner.endpoint, "disconnecting");
        self.inner.disconnect();
    }

    /// Hand `message` to the write loop, or retain it until the next connection.
    ///
    /// While connected, waits up to `send_timeout` for room in the hand-off channel and
    /// returns [`SendOutcome::Rejected`] if none frees up; the message is then dropped. While
    /// not connected, the message is queued and, if the manager is idle and reconnection is
    /// enabled, a reconnect is started.
    ///
    /// [`SendOutcome::Delivered`] means the write loop owns the message, not that the peer has
    /// received it.
    pub async fn send(&self, message: M) -> SendOutcome {
        if let Some(outbound) = self.inner.live_outbound() {
            match timeout(self.inner.config.send_timeout, outbound.reserve()).await {
                Ok(Ok(permit)) => {
                    permit.send(message);
                    return SendOutcome::Delivered;
                }
                Ok(Err(_closed)) => {
                    // The connection dropped between the state check and the hand-off
                }
                Err(_elapsed) => return SendOutcome::Rejected(WsError::SendTimeout.into()),
            }
        }

        self.inner.retain(message).await
    }

    /// Set the bearer credential attached to the next handshake. An empty token clears it.
    pub fn set_auth_token(&self, token: &str) {
        let token = (!token.is_empty()).then(|| SecretString::from(token.to_owned()));
        *self
            .inner
            .auth_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn clear_auth_token(&self) {
        self.set_auth_token("");
    }

    #[must_use]
    pub fn has_auth_token(&self) -> bool {
        self.inner
            .auth_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Turn automatic reconnection on or off.
    ///
    /// Enabling while disconnected starts a reconnect right away. Disabling stops a reconnect
    /// loop that is waiting out its backoff.
    pub fn enable_reconnect(&self, enabled: bool) {
        let start = self.inner.update(|status| {
            status.reconnect_enabled = enabled;
            if !enabled && status.state == ConnectionState::Reconnecting {
                status.state = ConnectionState::Disconnected;
            }
            enabled && status.state == ConnectionState::Disconnected
        });

        if start {
            reconnect::trigger(&self.inner);
        } else if !enabled {
            self.inner.reconnect_wake.notify_waiters();
        }
    }

    /// Re-enable reconnection and dial immediately, skipping the backoff.
    pub async fn reconnect_now(&self) -> Result<()> {
        self.inner.update(|status| status.reconnect_enabled = true);
        self.inner.connect().await
    }

    /// The registered callbacks. Replace them at any time.
    #[must_use]
    pub fn handlers(&self) -> &EventHandlers {
        &self.inner.handlers
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.status().state
    }

    #[must_use]
    pub fn state_name(&self) -> &'static str {
        self.state().name()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Number of messages waiting for a connection.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.queue_len()
    }

    /// Reconnect attempts since the last successful connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.status().reconnect_attempts
    }

    /// The most recent connection error, cleared by a successful connection.
    #[must_use]
    pub fn last_error(&self) -> Option<ErrorSnapshot> {
        self.inner.status().last_error.clone()
    }

    #[must_use]
    pub fn is_reconnect_enabled(&self) -> bool {
        self.inner.status().reconnect_enabled
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        let (state, reconnect_attempts, last_error) = {
            let status = self.inner.status();
            (
                status.state,
                status.reconnect_attempts,
                status.last_error.clone(),
            )
        };

        ConnectionStats {
            state,
            queue_len: self.queue_len(),
            reconnect_attempts,
            last_error,
        }
    }

    /// Subscribe to connection state changes.
    ///
    /// A typed alternative to the on-state-change callback. Holds the latest state; slow
    /// receivers skip intermediate values.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to inbound payloads.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can receive payloads
    /// concurrently without blocking the read loop.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.inner.inbound_tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<Inner<M>> {
        &self.inner
    }
}

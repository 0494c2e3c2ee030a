//! Per-connection read and write loops, and the pending queue flush.
//!
//! Both loops belong to one connection generation. Whichever loop fails first cancels the
//! generation token, which stops its sibling, and reports the loss to the manager tagged with
//! its generation so a superseded pair can never tear down a newer connection.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::connection::{Inner, WsStream};
use super::error::WsError;
use crate::error::Error;

/// Reads frames until the peer goes away, the keepalive deadline passes or the generation is
/// cancelled.
///
/// The deadline is `keepalive.interval + keepalive.timeout` and is renewed by every inbound
/// frame, PONG replies included, so a quiet but healthy peer keeps the link alive by
/// answering our PINGs.
pub(crate) async fn read_loop<M>(
    inner: Arc<Inner<M>>,
    generation: u64,
    mut source: SplitStream<WsStream>,
    cancel: CancellationToken,
) where
    M: Serialize + Send + 'static,
{
    let window = inner.config.keepalive.read_deadline();
    let mut deadline = Instant::now() + window;

    let error = loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return,
            frame = timeout_at(deadline, source.next()) => frame,
        };

        let message = match frame {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => break Some(WsError::Connection(e)),
            Ok(None) => break Some(WsError::ConnectionClosed),
            Err(_elapsed) => break Some(WsError::KeepaliveTimeout),
        };
        deadline = Instant::now() + window;

        match message {
            Message::Text(text) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(generation, len = text.len(), "received text frame");
                inner.deliver(Bytes::copy_from_slice(text.as_bytes()));
            }
            Message::Binary(data) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(generation, len = data.len(), "received binary frame");
                inner.deliver(data);
            }
            #[cfg_attr(
                not(feature = "tracing"),
                expect(unused_variables, reason = "The close frame is only logged")
            )]
            Message::Close(frame) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(generation, ?frame, "peer closed connection");
                break None;
            }
            // PINGs are answered by tungstenite; PONGs only renew the deadline
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    };

    cancel.cancel();
    inner.connection_lost(generation, error.map(Error::from));
}

/// Writes handed-off messages as JSON text frames and sends a PING every keepalive interval.
pub(crate) async fn write_loop<M>(
    inner: Arc<Inner<M>>,
    generation: u64,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<M>,
    cancel: CancellationToken,
) where
    M: Serialize + Send + 'static,
{
    let write_timeout = inner.config.write_timeout;
    let period = inner.config.keepalive.interval;
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let error = loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => {
                _ = timeout(write_timeout, sink.close()).await;
                return;
            }
            message = outbound.recv() => {
                let Some(message) = message else {
                    // The manager dropped this generation's link
                    return;
                };
                match serde_json::to_string(&message) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        let error = Error::from(WsError::Serialize(e));
                        #[cfg(feature = "tracing")]
                        tracing::warn!(generation, error = %error, "skipping unserializable message");
                        inner.handlers.error(&error);
                        continue;
                    }
                }
            }
            _ = keepalive.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => break WsError::Connection(e),
            Err(_elapsed) => break WsError::WriteTimeout,
        }
    };

    cancel.cancel();
    inner.connection_lost(generation, Some(error.into()));
}

/// Drains the pending queue into the fresh connection in FIFO order.
///
/// Each message gets `flush_item_timeout` to find room in the hand-off channel. The first one
/// that does not goes back to the head of the queue and the flush stops; whatever is still
/// queued waits for the next successful connection. Returns how many messages were handed off.
///
/// Flushes are serialized so two of them never interleave queued messages.
pub(crate) async fn flush_queue<M>(inner: &Arc<Inner<M>>, outbound: &mpsc::Sender<M>) -> usize
where
    M: Serialize + Send + 'static,
{
    let _flushing = inner.flush_lock.lock().await;
    let mut flushed = 0_usize;

    while let Some(message) = inner.dequeue() {
        match timeout(inner.config.flush_item_timeout, outbound.reserve()).await {
            Ok(Ok(permit)) => {
                permit.send(message);
                flushed += 1;
            }
            Ok(Err(_)) | Err(_) => {
                inner.requeue_front(message);
                #[cfg(feature = "tracing")]
                tracing::debug!(flushed, "queue flush stopped early");
                return flushed;
            }
        }
    }

    #[cfg(feature = "tracing")]
    if flushed > 0 {
        tracing::debug!(flushed, "flushed pending queue");
    }
    flushed
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ws::ConnectionManager;
    use crate::ws::config::Config;

    fn manager(capacity: usize) -> ConnectionManager<u32> {
        let config = Config::builder()
            .queue_capacity(capacity)
            .flush_item_timeout(Duration::from_millis(10))
            .build();
        let manager = ConnectionManager::new("ws://127.0.0.1:9/ws", config).unwrap();
        manager.enable_reconnect(false);
        manager
    }

    #[tokio::test]
    async fn flush_preserves_fifo_order() {
        let manager = manager(10);
        for i in 0..5 {
            assert!(manager.send(i).await.is_queued());
        }
        let (tx, mut rx) = mpsc::channel(10);

        assert_eq!(flush_queue(manager.inner(), &tx).await, 5);

        let mut received = Vec::new();
        while let Ok(value) = rx.try_recv() {
            received.push(value);
        }
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        assert_eq!(manager.queue_len(), 0);
    }

    #[tokio::test]
    async fn flush_stops_at_first_blocked_item_and_keeps_the_rest() {
        let manager = manager(10);
        for i in 0..5 {
            _ = manager.send(i).await;
        }
        // Room for two; the third hand-off times out
        let (tx, mut rx) = mpsc::channel(2);

        assert_eq!(flush_queue(manager.inner(), &tx).await, 2);

        assert_eq!(rx.try_recv().unwrap(), 0);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(manager.queue_len(), 3);

        // The blocked item is back at the head
        flush_queue(manager.inner(), &tx).await;
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert_eq!(rx.try_recv().unwrap(), 3);
        assert_eq!(manager.queue_len(), 1);
    }

    #[tokio::test]
    async fn flush_into_closed_channel_keeps_everything() {
        let manager = manager(10);
        for i in 0..3 {
            _ = manager.send(i).await;
        }
        let (tx, rx) = mpsc::channel::<u32>(4);
        drop(rx);

        assert_eq!(flush_queue(manager.inner(), &tx).await, 0);

        assert_eq!(manager.queue_len(), 3);
    }
}

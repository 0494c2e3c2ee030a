use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::sleep;

use super::connection::Inner;
use super::state::ConnectionState;

/// Starts the reconnect loop unless one is already running.
///
/// The slot is a single flag: redundant triggers are dropped, never queued, so any number of
/// concurrent callers yields at most one loop.
pub(crate) fn trigger<M>(inner: &Arc<Inner<M>>)
where
    M: Serialize + Send + 'static,
{
    if inner
        .reconnect_active
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        #[cfg(feature = "tracing")]
        tracing::trace!("reconnect already in progress");
        return;
    }

    let Ok(runtime) = Handle::try_current() else {
        inner.reconnect_active.store(false, Ordering::Release);
        #[cfg(feature = "tracing")]
        tracing::warn!("no Tokio runtime available, cannot schedule reconnect");
        return;
    };

    runtime.spawn(run(Arc::clone(inner)));
}

/// Holds the trigger slot for the lifetime of one reconnect loop.
///
/// Dropping it, on return or while unwinding, leaves no one staring at `Reconnecting` and frees
/// the slot for the next trigger.
struct ActiveSlot<M>(Arc<Inner<M>>)
where
    M: Serialize + Send + 'static;

impl<M> Drop for ActiveSlot<M>
where
    M: Serialize + Send + 'static,
{
    fn drop(&mut self) {
        self.0.update(|status| {
            if status.state == ConnectionState::Reconnecting {
                status.state = ConnectionState::Disconnected;
            }
        });
        self.0.reconnect_active.store(false, Ordering::Release);
    }
}

/// Retries `connect` with exponential backoff until it succeeds, reconnection is disabled or
/// the manager shuts down.
async fn run<M>(inner: Arc<Inner<M>>)
where
    M: Serialize + Send + 'static,
{
    let slot = ActiveSlot(Arc::clone(&inner));
    let shutdown = inner.shutdown_token();

    loop {
        // Entering `Reconnecting` and bumping the counter happen under the state lock, and
        // only while reconnection is still enabled
        let attempt = inner.update(|status| {
            let idle = matches!(
                status.state,
                ConnectionState::Disconnected | ConnectionState::Reconnecting
            );
            if !status.reconnect_enabled || !idle {
                return None;
            }
            status.reconnect_attempts = status.reconnect_attempts.saturating_add(1);
            status.state = ConnectionState::Reconnecting;
            Some(status.reconnect_attempts)
        });
        let Some(attempt) = attempt else {
            break;
        };

        let delay = inner.config.reconnect.jittered_delay_for_attempt(attempt);
        #[cfg(feature = "tracing")]
        tracing::info!(attempt, ?delay, endpoint = %inner.endpoint, "reconnecting");

        let woken = inner.reconnect_wake.notified();
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = woken => {}
            () = sleep(delay) => {}
        }

        if shutdown.is_cancelled() || !inner.status().reconnect_enabled {
            break;
        }

        match inner.connect().await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::info!(attempt, "reconnected successfully");
                break;
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, error = %e, "reconnection failed");
                if e.is_authentication() {
                    break;
                }
            }
        }
    }

    drop(slot);

    // A trigger that arrived while this loop was winding down was dropped; pick it up here
    if inner.should_reconnect() && !shutdown.is_cancelled() {
        trigger(&inner);
    }
}

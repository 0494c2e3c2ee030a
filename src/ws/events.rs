//! Observer hooks for connection lifecycle events.
//!
//! Each event kind has at most one handler. Handlers can be set, replaced or cleared at any
//! time, including while the manager is invoking the previous one:
//!
//! - [`on_state_change`](EventHandlers::set_on_state_change): the state field changed value
//! - [`on_message`](EventHandlers::set_on_message): an inbound payload arrived, verbatim
//! - [`on_error`](EventHandlers::set_on_error): a dial, read or write failure
//!
//! # Example
//!
//! ```rust,no_run
//! use printer_realtime::ws::{ConnectionManager, ConnectionState};
//!
//! # fn example() -> printer_realtime::Result<()> {
//! let manager: ConnectionManager = ConnectionManager::with_defaults("ws://printer.local:8080/ws")?;
//!
//! manager.handlers().set_on_state_change(|state: ConnectionState| {
//!     println!("link is now {state}");
//! });
//! manager.handlers().set_on_message(|payload| {
//!     println!("received {} bytes", payload.len());
//! });
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use super::state::ConnectionState;
use crate::error::Error;

/// Type alias for the on-state-change callback.
pub type OnStateChange = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Type alias for the on-message callback.
pub type OnMessage = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Type alias for the on-error callback.
pub type OnError = Arc<dyn Fn(&Error) + Send + Sync>;

/// Listener interface covering all three event kinds at once.
///
/// Every method defaults to a no-op, so implementors only override what they care about.
/// Install with [`EventHandlers::set_listener`].
pub trait ConnectionListener: Send + Sync + 'static {
    fn on_state_change(&self, _state: ConnectionState) {}

    /// Must return quickly; the read loop waits for it before reading the next frame.
    fn on_message(&self, _payload: &Bytes) {}

    fn on_error(&self, _error: &Error) {}
}

#[derive(Default, Clone)]
struct Slots {
    on_state_change: Option<OnStateChange>,
    on_message: Option<OnMessage>,
    on_error: Option<OnError>,
}

/// Replaceable single-slot callbacks, one per event kind.
#[derive(Default)]
pub struct EventHandlers {
    slots: RwLock<Slots>,
}

impl EventHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_state_change<F>(&self, f: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.write(|slots| slots.on_state_change = Some(Arc::new(f)));
    }

    pub fn set_on_message<F>(&self, f: F)
    where
        F: Fn(&Bytes) + Send + Sync + 'static,
    {
        self.write(|slots| slots.on_message = Some(Arc::new(f)));
    }

    pub fn set_on_error<F>(&self, f: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.write(|slots| slots.on_error = Some(Arc::new(f)));
    }

    /// Routes all three event kinds to `listener`, replacing any individual callbacks.
    pub fn set_listener<L: ConnectionListener>(&self, listener: Arc<L>) {
        let on_state = Arc::clone(&listener);
        let on_message = Arc::clone(&listener);
        let on_error = listener;

        self.write(|slots| {
            *slots = Slots {
                on_state_change: Some(Arc::new(move |state: ConnectionState| {
                    on_state.on_state_change(state);
                })),
                on_message: Some(Arc::new(move |payload: &Bytes| {
                    on_message.on_message(payload);
                })),
                on_error: Some(Arc::new(move |error: &Error| on_error.on_error(error))),
            };
        });
    }

    pub fn clear_on_state_change(&self) {
        self.write(|slots| slots.on_state_change = None);
    }

    pub fn clear_on_message(&self) {
        self.write(|slots| slots.on_message = None);
    }

    pub fn clear_on_error(&self) {
        self.write(|slots| slots.on_error = None);
    }

    /// Drops every registered callback.
    pub fn clear(&self) {
        self.write(|slots| *slots = Slots::default());
    }

    pub(crate) fn state_changed(&self, state: ConnectionState) {
        // Clone out of the lock so a handler may replace itself without deadlocking
        let handler = self.read().on_state_change;
        if let Some(handler) = handler {
            handler(state);
        }
    }

    pub(crate) fn message(&self, payload: &Bytes) {
        let handler = self.read().on_message;
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    pub(crate) fn error(&self, error: &Error) {
        let handler = self.read().on_error;
        if let Some(handler) = handler {
            handler(error);
        }
    }

    fn read(&self) -> Slots {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write<F: FnOnce(&mut Slots)>(&self, f: F) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut slots);
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.read();
        f.debug_struct("EventHandlers")
            .field("on_state_change", &slots.on_state_change.is_some())
            .field("on_message", &slots.on_message.is_some())
            .field("on_error", &slots.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn unset_handlers_are_noops() {
        let handlers = EventHandlers::new();

        handlers.state_changed(ConnectionState::Connected);
        handlers.message(&Bytes::from_static(b"{}"));
        handlers.error(&Error::validation("ignored"));
    }

    #[test]
    fn replacing_handler_routes_later_events_to_new_one() {
        let handlers = EventHandlers::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        handlers.set_on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handlers.message(&Bytes::from_static(b"a"));

        let counter = Arc::clone(&second);
        handlers.set_on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handlers.message(&Bytes::from_static(b"b"));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_replace_itself_while_running() {
        let handlers = Arc::new(EventHandlers::new());
        let inner = Arc::clone(&handlers);

        handlers.set_on_state_change(move |_| {
            inner.set_on_state_change(|_| {});
        });

        handlers.state_changed(ConnectionState::Connecting);
        handlers.state_changed(ConnectionState::Connected);
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<ConnectionState>>,
    }

    impl ConnectionListener for Recorder {
        fn on_state_change(&self, state: ConnectionState) {
            self.states.lock().unwrap().push(state);
        }
    }

    #[test]
    fn listener_receives_state_changes() {
        let handlers = EventHandlers::new();
        let recorder = Arc::new(Recorder::default());
        handlers.set_listener(Arc::clone(&recorder));

        handlers.state_changed(ConnectionState::Connecting);
        handlers.state_changed(ConnectionState::Connected);
        handlers.message(&Bytes::from_static(b"ignored by recorder"));

        assert_eq!(
            *recorder.states.lock().unwrap(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[test]
    fn clear_removes_all_handlers() {
        let handlers = EventHandlers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        handlers.set_on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handlers.clear();
        handlers.error(&Error::validation("dropped"));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_QUEUE_CAPACITY: usize = 1000;
const DEFAULT_HANDOFF_CAPACITY: usize = 100;
const DEFAULT_SEND_TIMEOUT_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_FLUSH_ITEM_TIMEOUT_DURATION: Duration = Duration::from_millis(100);
const DEFAULT_KEEPALIVE_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_KEEPALIVE_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(120);

/// Configuration for [`ConnectionManager`](super::ConnectionManager) behavior.
///
/// ```
/// use std::time::Duration;
///
/// use printer_realtime::ws::config::{Config, KeepaliveConfig};
///
/// let config = Config::builder()
///     .queue_capacity(50)
///     .keepalive(KeepaliveConfig::builder().interval(Duration::from_secs(5)).build())
///     .build();
///
/// assert_eq!(config.queue_capacity, 50);
/// assert_eq!(config.send_timeout, Duration::from_secs(5));
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Maximum number of messages retained while not connected. The oldest entry is evicted
    /// when a push would exceed this.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Slots in the hand-off channel between `send` and the write loop
    #[builder(default = DEFAULT_HANDOFF_CAPACITY)]
    pub handoff_capacity: usize,
    /// How long `send` waits for a hand-off slot while connected
    #[builder(default = DEFAULT_SEND_TIMEOUT_DURATION)]
    pub send_timeout: Duration,
    /// Deadline for writing a single frame
    #[builder(default = DEFAULT_WRITE_TIMEOUT_DURATION)]
    pub write_timeout: Duration,
    /// Deadline for the WebSocket handshake
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
    /// How long the queue flush waits on each queued message before giving up
    #[builder(default = DEFAULT_FLUSH_ITEM_TIMEOUT_DURATION)]
    pub flush_item_timeout: Duration,
    /// Liveness probing
    #[builder(default)]
    pub keepalive: KeepaliveConfig,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for PING frames and the read deadline that catches a silently dead peer.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct KeepaliveConfig {
    /// Interval for sending PING frames to keep the connection alive
    #[builder(default = DEFAULT_KEEPALIVE_INTERVAL_DURATION)]
    pub interval: Duration,
    /// Grace period on top of `interval` for a PONG (or any frame) to show up
    #[builder(default = DEFAULT_KEEPALIVE_TIMEOUT_DURATION)]
    pub timeout: Duration,
}

impl KeepaliveConfig {
    /// Longest a connection may stay silent before the read loop gives up on it.
    #[must_use]
    pub fn read_deadline(&self) -> Duration {
        self.interval.saturating_add(self.timeout)
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Backoff before the first reconnection attempt
    #[builder(default = DEFAULT_INITIAL_BACKOFF_DURATION)]
    pub initial_backoff: Duration,
    /// Ceiling for the backoff
    #[builder(default = DEFAULT_MAX_BACKOFF_DURATION)]
    pub max_backoff: Duration,
    /// Fraction of the computed delay added as random jitter, in `0.0..=1.0`. `0.0` keeps the
    /// schedule deterministic.
    #[builder(default)]
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ReconnectConfig {
    /// Delay before reconnect `attempt` (1-based): `initial_backoff * 2^(attempt - 1)`, capped
    /// at `max_backoff`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        1_u32
            .checked_shl(exponent)
            .and_then(|factor| self.initial_backoff.checked_mul(factor))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// [`Self::delay_for_attempt`] with jitter applied on top. A jitter that does not yield a
    /// representable duration is ignored.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "Jitter is a fraction of the delay by definition"
    )]
    pub fn jittered_delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }

        let extra = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        Duration::try_from_secs_f64(extra).map_or(delay, |extra| delay.saturating_add(extra))
    }
}

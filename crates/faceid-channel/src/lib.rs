#![warn(missing_docs)]
//! # faceid-channel
//!
//! ## Purpose
//! Owns the persistent bidirectional channel between the client and the
//! detection/verification service.
//!
//! ## Responsibilities
//! - Validate the service endpoint.
//! - Drive connect / disconnect / bounded reconnect lifecycle on top of an
//!   injectable [`ChannelTransport`].
//! - Publish lifecycle events and inbound frames, in arrival order, to every
//!   subscriber.
//!
//! ## Data flow
//! Host transport reports [`TransportEvent`]s ->
//! [`ChannelConnection::handle_transport_event`] updates status ->
//! [`ConnectionEvent`]s fan out to subscribers via [`ChannelConnection::subscribe`].
//! Outbound text frames go through [`ChannelConnection::emit`].
//!
//! ## Ownership and lifetimes
//! One [`ChannelConnection`] owns its transport. Consumers borrow it
//! explicitly (`&mut ChannelConnection`) when sending; nothing holds a global
//! handle.
//!
//! ## Error model
//! Sending while not connected returns [`ChannelError::NotConnected`]; the
//! caller aborts the action locally. Reconnect exhaustion is a lifecycle
//! event plus [`ConnectionStatus::Failed`], not an error.
//!
//! ## Security and privacy notes
//! Frame contents are never logged, only their length.
//!
//! ## Example
//! ```rust
//! use faceid_channel::{ChannelConfig, ChannelConnection, MemoryTransport, TransportEvent};
//! use faceid_core::ConnectionStatus;
//!
//! let (transport, _probe) = MemoryTransport::new();
//! let mut channel =
//!     ChannelConnection::new(ChannelConfig::new("http://localhost:5000"), Box::new(transport))
//!         .unwrap();
//! channel.open(0);
//! channel.handle_transport_event(TransportEvent::Opened, 10);
//! assert_eq!(channel.status(), ConnectionStatus::Connected);
//! ```

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender};
use faceid_core::{ConnectionStatus, Timer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use url::Url;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default cap on automatic reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before each reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Reason reported when the client itself closes the channel.
pub const CLIENT_DISCONNECT_REASON: &str = "io client disconnect";

/// Reason reported when a connect attempt exceeds the timeout.
pub const CONNECT_TIMEOUT_REASON: &str = "timeout";

/// Automatic reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether lost or failed connections are retried automatically.
    pub enabled: bool,
    /// Attempts before giving up with `ReconnectExhausted`.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub base_delay_ms: u64,
    /// Upper bound for the doubled delay of later attempts.
    pub max_delay_ms: u64,
    /// Uniform random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            jitter_ms: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before 1-based `attempt`.
    ///
    /// The base delay doubles per attempt and is capped at `max_delay_ms`;
    /// with the defaults (`base == max`) every attempt waits the same time.
    pub fn delay_for_attempt(&self, attempt: u32, rng: &mut impl Rng) -> u64 {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.base_delay_ms.saturating_mul(1_u64 << exponent);
        let capped = scaled.min(self.max_delay_ms.max(self.base_delay_ms));
        if self.jitter_ms == 0 {
            return capped;
        }
        capped.saturating_add(rng.random_range(0..=self.jitter_ms))
    }
}

/// Channel configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Service endpoint (`http`, `https`, `ws` or `wss`).
    pub endpoint: String,
    /// Time allowed for one connect attempt.
    pub connect_timeout_ms: u64,
    /// Automatic reconnection policy.
    pub reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    /// Creates configuration with default timeout and reconnection policy.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Low-level notification reported by the host transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The pending connect attempt completed.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The connection closed (or a pending connect was refused).
    Closed {
        /// Transport-supplied reason.
        reason: String,
    },
    /// The transport failed.
    Failed {
        /// Transport-supplied reason.
        reason: String,
    },
}

/// Host-provided transport carrying text frames.
///
/// `connect` only initiates; completion is reported back through
/// [`ChannelConnection::handle_transport_event`].
pub trait ChannelTransport {
    /// Starts connecting to `endpoint`.
    ///
    /// # Errors
    /// Returns [`ChannelError::Transport`] when the attempt cannot even start.
    fn connect(&mut self, endpoint: &Url) -> Result<(), ChannelError>;

    /// Sends one text frame on the open connection.
    ///
    /// # Errors
    /// Returns [`ChannelError::Transport`] when the write fails.
    fn send(&mut self, frame: &str) -> Result<(), ChannelError>;

    /// Tears down the connection or pending attempt.
    fn close(&mut self);
}

/// Lifecycle and inbound events published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Channel is open.
    Connected,
    /// A connect attempt failed.
    ConnectError {
        /// Failure reason.
        reason: String,
    },
    /// An open channel closed.
    Disconnected {
        /// Close reason.
        reason: String,
    },
    /// Automatic reconnect attempt `n` (1-based) started.
    ReconnectAttempt(u32),
    /// Reconnected after `n` attempts.
    Reconnected(u32),
    /// Automatic reconnection gave up.
    ReconnectExhausted,
    /// One inbound application frame.
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Connecting,
    Open,
    AwaitingReconnect,
    Exhausted,
}

/// Persistent channel with bounded automatic reconnection.
pub struct ChannelConnection {
    endpoint: Url,
    config: ChannelConfig,
    transport: Box<dyn ChannelTransport>,
    phase: Phase,
    reconnect_attempts: u32,
    connect_deadline: Timer,
    reconnect_timer: Timer,
    subscribers: Vec<Sender<ConnectionEvent>>,
    rng: StdRng,
}

impl ChannelConnection {
    /// Creates a closed channel.
    ///
    /// # Errors
    /// Returns [`ChannelError::InvalidEndpoint`] when the endpoint is not a
    /// valid `http(s)`/`ws(s)` URL.
    pub fn new(config: ChannelConfig, transport: Box<dyn ChannelTransport>) -> Result<Self, ChannelError> {
        let endpoint = validate_endpoint(&config.endpoint)?;
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();

        Ok(Self {
            endpoint,
            config,
            transport,
            phase: Phase::Closed,
            reconnect_attempts: 0,
            connect_deadline: Timer::default(),
            reconnect_timer: Timer::default(),
            subscribers: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Registers a subscriber. Every later event is delivered to it in
    /// publication order.
    pub fn subscribe(&mut self) -> Receiver<ConnectionEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Opens the channel. No-op while already connecting or connected.
    ///
    /// A manual open after exhaustion starts a fresh reconnect budget.
    pub fn open(&mut self, now_ms: u64) {
        if matches!(self.phase, Phase::Connecting | Phase::Open) {
            log::debug!("channel open ignored: already {:?}", self.phase);
            return;
        }

        log::info!("channel opening {}", self.endpoint);
        self.reconnect_timer.cancel();
        self.reconnect_attempts = 0;
        self.begin_connect(now_ms);
    }

    /// Closes the channel unconditionally. Returns `false` when it was
    /// already closed.
    pub fn close(&mut self) -> bool {
        let previous = self.phase;
        if previous == Phase::Closed {
            return false;
        }

        self.connect_deadline.cancel();
        self.reconnect_timer.cancel();
        self.phase = Phase::Closed;

        match previous {
            Phase::Open => {
                self.transport.close();
                self.publish(ConnectionEvent::Disconnected {
                    reason: CLIENT_DISCONNECT_REASON.to_string(),
                });
            }
            Phase::Connecting => self.transport.close(),
            Phase::AwaitingReconnect | Phase::Exhausted | Phase::Closed => {}
        }

        log::info!("channel closed by client");
        true
    }

    /// Applies one transport notification.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now_ms: u64) {
        match (self.phase, event) {
            (Phase::Connecting, TransportEvent::Opened) => {
                self.connect_deadline.cancel();
                self.phase = Phase::Open;
                let attempts = std::mem::take(&mut self.reconnect_attempts);
                if attempts > 0 {
                    log::info!("channel reconnected after {attempts} attempts");
                    self.publish(ConnectionEvent::Reconnected(attempts));
                } else {
                    log::info!("channel connected");
                }
                self.publish(ConnectionEvent::Connected);
            }
            (Phase::Open, TransportEvent::Frame(frame)) => {
                log::trace!("channel inbound frame ({} bytes)", frame.len());
                self.publish(ConnectionEvent::Message(frame));
            }
            (
                Phase::Connecting,
                TransportEvent::Failed { reason } | TransportEvent::Closed { reason },
            ) => self.on_connect_failure(reason, now_ms),
            (Phase::Open, TransportEvent::Failed { reason } | TransportEvent::Closed { reason }) => {
                log::warn!("channel disconnected: {reason}");
                self.publish(ConnectionEvent::Disconnected { reason });
                self.schedule_reconnect(now_ms);
            }
            (phase, event) => {
                log::debug!("channel ignored {event:?} while {phase:?}");
            }
        }
    }

    /// Fires due connect-timeout and reconnect timers.
    pub fn poll(&mut self, now_ms: u64) {
        if self.connect_deadline.fire_if_due(now_ms) && self.phase == Phase::Connecting {
            self.transport.close();
            self.on_connect_failure(CONNECT_TIMEOUT_REASON.to_string(), now_ms);
        }

        if self.reconnect_timer.fire_if_due(now_ms) && self.phase == Phase::AwaitingReconnect {
            self.reconnect_attempts += 1;
            log::info!(
                "channel reconnect attempt {}/{}",
                self.reconnect_attempts,
                self.config.reconnect.max_attempts
            );
            self.publish(ConnectionEvent::ReconnectAttempt(self.reconnect_attempts));
            self.begin_connect(now_ms);
        }
    }

    /// Sends one text frame.
    ///
    /// # Errors
    /// Returns [`ChannelError::NotConnected`] unless the channel is open, and
    /// propagates transport write failures.
    pub fn emit(&mut self, frame: &str) -> Result<(), ChannelError> {
        if self.phase != Phase::Open {
            return Err(ChannelError::NotConnected);
        }
        self.transport.send(frame)
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        match self.phase {
            Phase::Connecting => ConnectionStatus::Connecting,
            Phase::Open => ConnectionStatus::Connected,
            Phase::Closed | Phase::AwaitingReconnect => ConnectionStatus::Disconnected,
            Phase::Exhausted => ConnectionStatus::Failed,
        }
    }

    /// Returns `true` while the channel is open.
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Reconnect attempts made since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Configured attempt cap.
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.config.reconnect.max_attempts
    }

    /// Validated endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn begin_connect(&mut self, now_ms: u64) {
        self.phase = Phase::Connecting;
        self.connect_deadline.arm_once(now_ms, self.config.connect_timeout_ms);
        if let Err(error) = self.transport.connect(&self.endpoint) {
            self.on_connect_failure(error.to_string(), now_ms);
        }
    }

    fn on_connect_failure(&mut self, reason: String, now_ms: u64) {
        self.connect_deadline.cancel();
        log::warn!("channel connect error: {reason}");
        self.publish(ConnectionEvent::ConnectError { reason });
        self.schedule_reconnect(now_ms);
    }

    fn schedule_reconnect(&mut self, now_ms: u64) {
        let policy = self.config.reconnect;
        if !policy.enabled || self.reconnect_attempts >= policy.max_attempts {
            self.phase = Phase::Exhausted;
            log::warn!(
                "channel reconnection exhausted after {} attempts",
                self.reconnect_attempts
            );
            self.publish(ConnectionEvent::ReconnectExhausted);
            return;
        }

        self.phase = Phase::AwaitingReconnect;
        let delay_ms = policy.delay_for_attempt(self.reconnect_attempts + 1, &mut self.rng);
        self.reconnect_timer.arm_once(now_ms, delay_ms);
    }

    fn publish(&mut self, event: ConnectionEvent) {
        // Subscribers whose receiver was dropped are pruned on send failure.
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Validates a service endpoint.
///
/// # Errors
/// Returns [`ChannelError::InvalidEndpoint`] for unparsable URLs or schemes
/// other than `http`, `https`, `ws`, `wss`.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, ChannelError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| ChannelError::InvalidEndpoint(format!("invalid url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(ChannelError::InvalidEndpoint(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }

    Ok(parsed)
}

/// Shared record of everything a [`MemoryTransport`] was asked to do.
#[derive(Debug, Default)]
struct TransportLog {
    connects: Vec<String>,
    sent: Vec<String>,
    closes: u32,
    refuse_connect: bool,
}

/// In-memory transport for tests and demos.
///
/// It never completes a connection by itself; the test feeds
/// [`TransportEvent`]s into the channel to simulate the network.
#[derive(Debug)]
pub struct MemoryTransport {
    log: Arc<Mutex<TransportLog>>,
}

/// Inspection handle for a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct TransportProbe {
    log: Arc<Mutex<TransportLog>>,
}

impl MemoryTransport {
    /// Creates a transport plus its probe.
    pub fn new() -> (Self, TransportProbe) {
        let log = Arc::new(Mutex::new(TransportLog::default()));
        (
            Self {
                log: Arc::clone(&log),
            },
            TransportProbe { log },
        )
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut TransportLog) -> T) -> Result<T, ChannelError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| ChannelError::Transport("memory transport lock poisoned".to_string()))?;
        Ok(f(&mut log))
    }
}

impl ChannelTransport for MemoryTransport {
    fn connect(&mut self, endpoint: &Url) -> Result<(), ChannelError> {
        let refused = self.with_log(|log| {
            log.connects.push(endpoint.to_string());
            log.refuse_connect
        })?;
        if refused {
            return Err(ChannelError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn send(&mut self, frame: &str) -> Result<(), ChannelError> {
        self.with_log(|log| log.sent.push(frame.to_string()))
    }

    fn close(&mut self) {
        let _ = self.with_log(|log| log.closes += 1);
    }
}

impl TransportProbe {
    /// Frames sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.read(|log| log.sent.clone())
    }

    /// Drains the sent frames.
    pub fn take_sent(&self) -> Vec<String> {
        self.write(|log| std::mem::take(&mut log.sent))
    }

    /// Number of connect attempts started.
    pub fn connect_count(&self) -> usize {
        self.read(|log| log.connects.len())
    }

    /// Number of `close` calls received.
    pub fn close_count(&self) -> u32 {
        self.read(|log| log.closes)
    }

    /// Makes later `connect` calls fail synchronously.
    pub fn refuse_connections(&self, refuse: bool) {
        self.write(|log| log.refuse_connect = refuse);
    }

    fn read<T: Default>(&self, f: impl FnOnce(&TransportLog) -> T) -> T {
        self.log.lock().map(|log| f(&log)).unwrap_or_default()
    }

    fn write<T: Default>(&self, f: impl FnOnce(&mut TransportLog) -> T) -> T {
        self.log.lock().map(|mut log| f(&mut log)).unwrap_or_default()
    }
}

/// Channel layer error type.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Endpoint is not a usable service URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// The channel is not open.
    #[error("channel is not connected")]
    NotConnected,
    /// Transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

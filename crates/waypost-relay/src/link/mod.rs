//! Peripheral link transport and session state machine
//!
//! This module owns the lifecycle of the wireless connection to the display
//! peripheral:
//!
//! ```text
//! Idle -> Connecting -> Discovering -> Ready -> Disconnecting -> Idle
//!             |              |           |
//!             +--------------+-----------+--> ErrorBackoff
//! ```
//!
//! `ErrorBackoff` parks the failed session attempt; the owner of the
//! connectivity signals decides whether to re-attempt. A `radioDisabled`
//! signal forces any state back to `Idle`; `radioEnabled` re-attempts with
//! the stored peripheral identity. Link loss with auto-reconnect enabled
//! makes one immediate reconnect attempt; further attempts are deferred
//! with exponential delay and driven by later calls to
//! [`LinkStateMachine::maybe_reconnect`], so the caller's event loop keeps
//! draining while the peripheral stays unreachable.
//!
//! Session handles are defined if and only if the state is `Ready`; they
//! are released before any later connect attempt so a stale handle can
//! never be written to.

#[cfg(feature = "ble")]
mod ble;
#[cfg(feature = "ble")]
pub use ble::BleTransport;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{PeripheralAddress, PeripheralConfig, ReconnectConfig};
use crate::error::{RelayError, Result};

/// Opaque write target on the peripheral, minted by the transport during
/// discovery and only valid for the session that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(u64);

impl ChannelHandle {
    /// Create a handle from a transport-defined token
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// The transport-defined token
    pub fn token(&self) -> u64 {
        self.0
    }
}

/// Result of a successful capability handshake
#[derive(Debug, Clone, Copy)]
pub struct Discovered {
    /// Write target for time/power status frames
    pub status_channel: ChannelHandle,
    /// Write target for command-tagged message frames
    pub message_channel: ChannelHandle,
    /// Maximum payload size the peripheral accepted
    pub payload_limit: usize,
}

/// Trait for peripheral link transports
///
/// Abstracts over the concrete radio stack (BLE in production, a scripted
/// mock in tests) behind connect/discover/write primitives. The relay
/// serializes all calls; implementations may assume one outstanding
/// operation at a time.
#[async_trait]
pub trait LinkTransport: Send {
    /// Open the link layer to the peripheral at `address`
    async fn connect(&mut self, address: &PeripheralAddress) -> Result<()>;

    /// Verify the required service/channels and negotiate the payload limit
    ///
    /// Returns [`RelayError::UnsupportedPeripheral`] when the well-known
    /// service or either required channel is absent.
    async fn discover(&mut self, requested_limit: usize) -> Result<Discovered>;

    /// Re-request the payload limit (idempotent; best-effort)
    async fn request_payload_limit(&mut self, limit: usize) -> Result<usize>;

    /// Write one frame to a channel
    async fn write(&mut self, channel: ChannelHandle, frame: &[u8]) -> Result<()>;

    /// Tear the link down
    async fn disconnect(&mut self) -> Result<()>;

    /// Peripheral display name, if the transport knows one (for logging)
    fn peripheral_name(&self) -> Option<String> {
        None
    }
}

/// Link session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No active session
    Idle,
    /// Connect request issued to a specific peripheral identity
    Connecting,
    /// Link is up; capability handshake in progress
    Discovering,
    /// Channels resolved; writes are permitted
    Ready,
    /// Explicit teardown in progress
    Disconnecting,
    /// The current session attempt failed; awaiting an external decision
    ErrorBackoff,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Idle => write!(f, "idle"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Discovering => write!(f, "discovering"),
            LinkState::Ready => write!(f, "ready"),
            LinkState::Disconnecting => write!(f, "disconnecting"),
            LinkState::ErrorBackoff => write!(f, "error-backoff"),
        }
    }
}

/// One connect-to-disconnect lifetime of the peripheral link
///
/// Handles are `Some` exactly when the state is [`LinkState::Ready`]; the
/// only mutators are `make_ready` and `transition`, which maintain that
/// invariant together.
#[derive(Debug, Clone)]
pub struct LinkSession {
    state: LinkState,
    negotiated_payload_limit: usize,
    status_channel: Option<ChannelHandle>,
    message_channel: Option<ChannelHandle>,
}

impl LinkSession {
    fn new(payload_limit: usize) -> Self {
        Self {
            state: LinkState::Idle,
            negotiated_payload_limit: payload_limit,
            status_channel: None,
            message_channel: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether writes are currently permitted
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// Negotiated maximum payload size for this session
    pub fn payload_limit(&self) -> usize {
        self.negotiated_payload_limit
    }

    /// Status channel handle; defined iff `Ready`
    pub fn status_channel(&self) -> Option<ChannelHandle> {
        self.status_channel
    }

    /// Message channel handle; defined iff `Ready`
    pub fn message_channel(&self) -> Option<ChannelHandle> {
        self.message_channel
    }

    /// Move to a non-ready state, releasing the handles first
    fn transition(&mut self, state: LinkState) {
        debug_assert!(state != LinkState::Ready, "use make_ready for Ready");
        self.status_channel = None;
        self.message_channel = None;
        self.state = state;
    }

    /// Enter `Ready` with freshly discovered handles
    fn make_ready(&mut self, discovered: Discovered) {
        self.status_channel = Some(discovered.status_channel);
        self.message_channel = Some(discovered.message_channel);
        self.negotiated_payload_limit = discovered.payload_limit;
        self.state = LinkState::Ready;
    }
}

/// A pending deferred reconnect attempt
#[derive(Debug, Clone, Copy)]
struct RetryState {
    attempts: u32,
    delay: Duration,
    next_at: tokio::time::Instant,
}

/// Owns the link transport and drives the session state machine
pub struct LinkStateMachine<T: LinkTransport> {
    transport: T,
    session: LinkSession,
    peripheral: PeripheralConfig,
    reconnect: ReconnectConfig,
    address: Option<PeripheralAddress>,
    radio_on: bool,
    retry: Option<RetryState>,
    status_tx: watch::Sender<String>,
}

impl<T: LinkTransport> LinkStateMachine<T> {
    /// Create a state machine around a transport
    ///
    /// Returns the machine and a receiver for the human-readable link
    /// status line ("Connecting to ...", "Lost link to ...").
    pub fn new(
        transport: T,
        peripheral: PeripheralConfig,
        reconnect: ReconnectConfig,
    ) -> (Self, watch::Receiver<String>) {
        let (status_tx, status_rx) = watch::channel("Scanning...".to_string());
        let session = LinkSession::new(peripheral.payload_limit);
        (
            Self {
                transport,
                session,
                peripheral,
                reconnect,
                address: None,
                radio_on: true,
                retry: None,
                status_tx,
            },
            status_rx,
        )
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.session.state()
    }

    /// The current session
    pub fn session(&self) -> &LinkSession {
        &self.session
    }

    /// The stored peripheral identity, if one was configured
    pub fn address(&self) -> Option<&PeripheralAddress> {
        self.address.as_ref()
    }

    /// Store the peripheral identity and run one connection attempt
    pub async fn connect(&mut self, address: PeripheralAddress) -> Result<()> {
        self.address = Some(address);
        self.retry = None;
        if !self.radio_on {
            debug!("Radio is off; deferring connect until radioEnabled");
            return Ok(());
        }
        self.attempt().await
    }

    /// Radio became available; re-attempt with the stored identity
    pub async fn on_radio_enabled(&mut self) -> Result<()> {
        self.radio_on = true;
        self.retry = None;
        match self.address {
            Some(_) => self.attempt().await,
            None => {
                debug!("radioEnabled with no stored peripheral identity");
                Ok(())
            }
        }
    }

    /// Radio went away; force teardown to `Idle` from any state
    pub async fn on_radio_disabled(&mut self) {
        self.radio_on = false;
        self.teardown("Disconnected").await;
    }

    /// Explicit stop: `Ready -> Disconnecting -> Idle`
    pub async fn stop(&mut self) {
        self.teardown("Disconnected").await;
    }

    /// The link dropped mid-session
    ///
    /// Releases the session handles and closes the transport, then makes
    /// at most one immediate reconnect attempt (auto-reconnect enabled and
    /// radio still on). On failure the next attempt is scheduled with
    /// exponential delay and left for [`Self::maybe_reconnect`], so this
    /// call always returns promptly and never stalls the caller's event
    /// loop.
    pub async fn on_link_loss(&mut self) {
        let name = self.peripheral_label();
        warn!("Lost link to {}", name);
        self.publish_status(format!("Lost link to {}", name));
        self.session.transition(LinkState::Idle);
        self.close_transport().await;

        if !self.radio_on || !self.reconnect.enabled {
            return;
        }

        match self.attempt().await {
            Ok(()) => {}
            Err(RelayError::UnsupportedPeripheral { .. }) => {
                // No retry without a different peripheral
            }
            Err(e) => {
                debug!("Reconnect attempt 1 failed: {}", e);
                self.schedule_retry(1, e);
            }
        }
    }

    /// Run a scheduled reconnect attempt if its delay has elapsed
    ///
    /// No-op unless a retry is pending, the radio is on and the backoff
    /// delay has passed. Callers invoke this from periodic ticks and
    /// incoming events, which keeps retries bounded to one attempt per
    /// call.
    pub async fn maybe_reconnect(&mut self) {
        let Some(retry) = self.retry else {
            return;
        };
        if !self.radio_on || tokio::time::Instant::now() < retry.next_at {
            return;
        }

        self.retry = None;
        let attempts = retry.attempts + 1;
        match self.attempt().await {
            Ok(()) => {}
            Err(RelayError::UnsupportedPeripheral { .. }) => {}
            Err(e) => {
                debug!("Reconnect attempt {} failed: {}", attempts, e);
                self.schedule_retry(attempts, e);
            }
        }
    }

    /// Whether a deferred reconnect attempt is pending
    pub fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    /// Schedule the next deferred attempt, honoring the attempt bound
    fn schedule_retry(&mut self, attempts: u32, last_error: RelayError) {
        if self.reconnect.max_attempts != 0 && attempts >= self.reconnect.max_attempts {
            warn!(
                "Giving up reconnect after {} attempts: {}",
                attempts, last_error
            );
            return;
        }
        // Exponential backoff derived from the attempt count
        let mut delay = self.reconnect.initial_delay;
        for _ in 1..attempts {
            delay = (delay * 2).min(self.reconnect.max_delay);
        }
        self.retry = Some(RetryState {
            attempts,
            delay,
            next_at: tokio::time::Instant::now() + delay,
        });
    }

    /// One bounded connect + discovery attempt against the stored identity
    async fn attempt(&mut self) -> Result<()> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| RelayError::InvalidConfig("no peripheral address stored".into()))?;
        let deadline = self.peripheral.link_timeout;

        self.session.transition(LinkState::Connecting);
        self.publish_status(format!("Connecting to {}", address));
        info!("Connecting to {}", address);

        if let Err(e) = Self::bounded(deadline, self.transport.connect(&address)).await {
            self.close_transport().await;
            self.session.transition(LinkState::ErrorBackoff);
            self.publish_status("Disconnected".to_string());
            return Err(e);
        }

        self.session.transition(LinkState::Discovering);
        debug!("Link up, discovering channels");

        let requested = self.peripheral.payload_limit;
        match Self::bounded(deadline, self.transport.discover(requested)).await {
            Ok(discovered) => {
                self.session.make_ready(discovered);
                let name = self.peripheral_label();
                info!(
                    "Connected to {} (payload limit {})",
                    name, discovered.payload_limit
                );
                self.publish_status(format!("Connected to {}", name));
                Ok(())
            }
            Err(e) => {
                // Unsupported peripherals and timeouts both end the
                // attempt; the half-open link must not stay up
                self.close_transport().await;
                self.session.transition(LinkState::ErrorBackoff);
                self.publish_status("Disconnected".to_string());
                Err(e)
            }
        }
    }

    /// Close the transport link, best-effort
    async fn close_transport(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!("Transport disconnect reported: {}", e);
        }
    }

    /// Release handles, disconnect the transport, end in `Idle`
    async fn teardown(&mut self, status_line: &str) {
        self.retry = None;
        if self.session.state() == LinkState::Idle {
            return;
        }
        self.session.transition(LinkState::Disconnecting);
        self.publish_status(format!(
            "Disconnecting from {}",
            self.peripheral_label()
        ));
        self.close_transport().await;
        self.session.transition(LinkState::Idle);
        self.publish_status(status_line.to_string());
    }

    /// Run a fallible future with the configured bound, mapping elapse to
    /// `Timeout`
    async fn bounded<F, O>(deadline: Duration, fut: F) -> Result<O>
    where
        F: std::future::Future<Output = Result<O>>,
    {
        match timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                duration_ms: deadline.as_millis() as u64,
            }),
        }
    }

    fn peripheral_label(&self) -> String {
        self.transport
            .peripheral_name()
            .or_else(|| self.address.as_ref().map(|a| a.to_string()))
            .unwrap_or_else(|| "device".to_string())
    }

    fn publish_status(&self, line: String) {
        // Receivers may have gone away; status is advisory
        let _ = self.status_tx.send(line);
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn set_payload_limit(&mut self, limit: usize) {
        self.session.negotiated_payload_limit = limit;
    }

    /// The payload size the relay asks the transport for
    pub(crate) fn requested_payload_limit(&self) -> usize {
        self.peripheral.payload_limit
    }

    /// Both channel handles, or `NotReady`
    pub(crate) fn channels(&self) -> Result<(ChannelHandle, ChannelHandle)> {
        match (
            self.session.status_channel(),
            self.session.message_channel(),
        ) {
            (Some(status), Some(message)) if self.session.is_ready() => Ok((status, message)),
            _ => Err(RelayError::NotReady),
        }
    }
}

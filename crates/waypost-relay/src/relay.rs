//! RelayController - orchestration of the cue relay path
//!
//! The controller receives raw notification events, periodic ticks and
//! connectivity signals, decides whether/what to transmit, and drives the
//! link state machine. It owns all mutable relay state (`LastSent`, the
//! session) exclusively; the service layer funnels every input source
//! through one command queue so reads and updates stay atomic with respect
//! to each other.
//!
//! Relay-path failures never crash the controller: a failed transmission
//! leaves the dedup state untouched and is simply superseded by the next
//! successful cue.

use chrono::{Local, TimeZone};
use tracing::{debug, trace, warn};

use waypost_core::{CueFingerprint, CueParser, IconId, IconPayload};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::frame::FrameWriter;
use crate::icon_store::IconStore;
use crate::link::{LinkStateMachine, LinkTransport};

/// Source of the peripheral-reported power level (battery stand-in)
pub trait PowerSource: Send {
    /// Current power level, 0..=100
    fn power_level(&self) -> u8;
}

/// Radio availability edge events from the connectivity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySignal {
    /// The radio became available
    RadioEnabled,
    /// The radio went away
    RadioDisabled,
}

/// One notification lifecycle event from the OS collaborator
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// Source application identity
    pub app_id: String,
    /// OS notification id
    pub notification_id: i32,
    /// Raw notification title
    pub title: String,
    /// Raw notification body
    pub body: String,
    /// Icon representations, if the notification carried one
    pub icon: Option<IconPayload>,
    /// Whether this is a removal ("trip ended") event
    pub is_dismissal: bool,
    /// Event timestamp in Unix milliseconds
    pub timestamp_millis: i64,
}

/// Relay statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Full five-field cue transmissions that succeeded
    pub transmissions: u64,
    /// Cues skipped because their fingerprint matched the last sent one
    pub duplicates_skipped: u64,
    /// Events from allowed sources that did not parse as cues
    pub non_cue_events: u64,
    /// Dismissal ("trip ended") events handled
    pub dismissals: u64,
    /// Idle status-channel refreshes sent
    pub heartbeats: u64,
    /// Transmissions that failed partway and were not marked sent
    pub write_failures: u64,
    /// Events ignored because the source app is not allow-listed
    pub ignored_sources: u64,
}

/// Dedup state: identity and age of the last fully transmitted cue
#[derive(Debug, Default)]
struct LastSent {
    fingerprint: Option<CueFingerprint>,
    sent_at_millis: i64,
}

/// Orchestrates parsing, dedup, the link and the frame writer
pub struct RelayController<T: LinkTransport, P: PowerSource> {
    config: RelayConfig,
    link: LinkStateMachine<T>,
    power: P,
    icon_store: Option<IconStore>,
    last_sent: LastSent,
    stats: RelayStats,
}

impl<T: LinkTransport, P: PowerSource> RelayController<T, P> {
    /// Create a controller around a transport and power source
    ///
    /// Returns the controller and the human-readable link status receiver.
    pub fn new(
        config: RelayConfig,
        transport: T,
        power: P,
    ) -> (Self, tokio::sync::watch::Receiver<String>) {
        let (link, status_rx) = LinkStateMachine::new(
            transport,
            config.peripheral.clone(),
            config.reconnect.clone(),
        );
        let icon_store = config.relay.icon_dir.as_ref().map(IconStore::new);
        (
            Self {
                config,
                link,
                power,
                icon_store,
                last_sent: LastSent::default(),
                stats: RelayStats::default(),
            },
            status_rx,
        )
    }

    /// Connect to the configured peripheral
    pub async fn start(&mut self) -> Result<()> {
        let address = self.config.peripheral.address.clone();
        self.link.connect(address).await
    }

    /// Handle one notification lifecycle event
    pub async fn on_cue(&mut self, event: NotificationEvent) -> Result<()> {
        if !self.config.sources.allowed_apps.contains(&event.app_id) {
            trace!("Ignoring notification from {}", event.app_id);
            self.stats.ignored_sources += 1;
            return Ok(());
        }

        // Run any due deferred reconnect before handling the event
        self.link.maybe_reconnect().await;

        if event.is_dismissal {
            return self.on_trip_ended(&event).await;
        }

        let cue = match CueParser::parse(&event.title, &event.body) {
            Ok(cue) => cue,
            Err(e) if e.is_not_a_cue() => {
                // Expected: most notifications from the source are not cues
                debug!("Skipping non-cue notification {}", event.notification_id);
                self.stats.non_cue_events += 1;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let icon_id = self.resolve_icon(&event);
        let cue = cue.with_icon(icon_id.as_str());

        let fingerprint = CueFingerprint::compute(&cue);
        if self.last_sent.fingerprint.as_ref() == Some(&fingerprint) {
            trace!("Unchanged cue, skipping retransmission");
            self.stats.duplicates_skipped += 1;
            return Ok(());
        }

        match FrameWriter::transmit_cue(&mut self.link, &cue).await {
            Ok(()) => {
                debug!(
                    "writeLoc {{time={},dist={},loc={},eta={}}}",
                    cue.remaining_time,
                    cue.remaining_distance,
                    cue.location_label,
                    cue.estimated_arrival
                );
                self.last_sent.fingerprint = Some(fingerprint);
                self.last_sent.sent_at_millis = event.timestamp_millis;
                self.stats.transmissions += 1;
                Ok(())
            }
            Err(e) => {
                // All-or-nothing: partial success must not mark the cue
                // sent, so an identical later cue retries all five fields.
                warn!("Cue transmission failed: {}", e);
                self.stats.write_failures += 1;
                if e.is_link_loss() {
                    self.link.on_link_loss().await;
                }
                Err(e)
            }
        }
    }

    /// Periodic tick: refresh the status channel after the idle threshold
    ///
    /// The heartbeat is independent of cue deduplication and never touches
    /// the last-sent fingerprint.
    pub async fn on_tick(&mut self, now_millis: i64) {
        self.link.maybe_reconnect().await;

        let idle_ms = self.config.relay.idle_refresh.as_millis() as i64;
        if now_millis - self.last_sent.sent_at_millis <= idle_ms {
            return;
        }

        let time_text = clock_text(now_millis);
        match FrameWriter::write_status(&mut self.link, self.power.power_level(), &time_text).await
        {
            Ok(()) => {
                trace!("Heartbeat status refresh sent");
                self.stats.heartbeats += 1;
            }
            Err(e) => {
                debug!("Heartbeat skipped: {}", e);
                if e.is_link_loss() {
                    self.link.on_link_loss().await;
                }
            }
        }
    }

    /// Forward a connectivity signal to the link state machine
    pub async fn on_connectivity(&mut self, signal: ConnectivitySignal) {
        match signal {
            ConnectivitySignal::RadioEnabled => {
                if let Err(e) = self.link.on_radio_enabled().await {
                    warn!("Reconnect after radioEnabled failed: {}", e);
                }
            }
            ConnectivitySignal::RadioDisabled => self.link.on_radio_disabled().await,
        }
    }

    /// Stop the relay, tearing the link down
    pub async fn stop(&mut self) {
        self.link.stop().await;
    }

    /// Current statistics
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// The link state machine (read access)
    pub fn link(&self) -> &LinkStateMachine<T> {
        &self.link
    }

    /// The fingerprint of the last fully transmitted cue
    pub fn last_fingerprint(&self) -> Option<&CueFingerprint> {
        self.last_sent.fingerprint.as_ref()
    }

    /// Trip ended: re-arm dedup and put the idle clock on the display
    ///
    /// Dismissal is never deduplicated; the status write happens
    /// unconditionally and the dedup state resets even if it fails.
    async fn on_trip_ended(&mut self, event: &NotificationEvent) -> Result<()> {
        self.stats.dismissals += 1;
        let time_text = clock_text(event.timestamp_millis);
        let result =
            FrameWriter::write_status(&mut self.link, self.power.power_level(), &time_text).await;
        debug!("writeTime {{success={}}}", result.is_ok());
        if let Err(e) = result {
            if e.is_link_loss() {
                self.link.on_link_loss().await;
            }
        }
        self.last_sent.fingerprint = None;
        self.last_sent.sent_at_millis = event.timestamp_millis;
        Ok(())
    }

    /// Hash the event's icon, falling back across representations
    ///
    /// Icon trouble never blocks cue delivery; a cue without a usable icon
    /// carries the `"Unknown"` identity.
    fn resolve_icon(&self, event: &NotificationEvent) -> IconId {
        let Some(payload) = &event.icon else {
            return IconId::unknown();
        };
        match payload.content_id() {
            Ok(id) => {
                self.persist_icon(payload);
                id
            }
            Err(e) => {
                debug!("Icon extraction failed: {}", e);
                IconId::unknown()
            }
        }
    }

    /// Persist the icon rendition if a store is configured (best-effort)
    fn persist_icon(&self, payload: &IconPayload) {
        let Some(store) = &self.icon_store else {
            return;
        };
        match payload.to_asset() {
            Ok(asset) => {
                if let Err(e) = store.persist(&asset) {
                    debug!("Icon persist failed: {}", e);
                }
            }
            Err(e) => debug!("Icon rendition failed: {}", e),
        }
    }
}

/// Short local-time text for the status channel (e.g. "14:32")
fn clock_text(unix_millis: i64) -> String {
    match Local.timestamp_millis_opt(unix_millis).single() {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

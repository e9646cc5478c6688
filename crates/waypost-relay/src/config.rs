//! Configuration types for the waypost relay
//!
//! This module provides the relay configuration: peripheral identity and
//! payload sizing, the notification-source allow-list, relay behavior
//! (idle heartbeat, icon persistence), and reconnection policy.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::{uuid, Uuid};

use crate::error::RelayError;

/// GATT service the display peripheral must expose
pub const DISPLAY_SERVICE_UUID: Uuid = uuid!("3db02924-b2a6-4d47-be1f-0f90ad62a048");

/// Characteristic for command-tagged message frames
pub const MESSAGE_CHANNEL_UUID: Uuid = uuid!("8d8218b6-97bc-4527-a8db-13094ac06b1d");

/// Characteristic for time/power status frames
pub const STATUS_CHANNEL_UUID: Uuid = uuid!("b7b0a14b-3e94-488f-b262-5d584a1ef9e1");

/// Payload size requested from the transport for every session
pub const DEFAULT_PAYLOAD_LIMIT: usize = 500;

/// Idle threshold after which the status channel is refreshed
pub const DEFAULT_IDLE_REFRESH: Duration = Duration::from_secs(2 * 60);

/// Default connect/discovery timeout
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(10);

/// The navigation application whose notifications are relayed by default
pub const DEFAULT_NAVIGATION_APP: &str = "com.google.android.apps.maps";

/// Placeholder peripheral address used until one is configured
pub const UNCONFIGURED_ADDRESS: &str = "00:00:00:00:00:00";

/// A validated MAC-like peripheral address (six hex pairs)
///
/// Input may be lower case and may omit the colons; it is normalized to the
/// canonical upper-case colon-delimited form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeripheralAddress([u8; 6]);

impl PeripheralAddress {
    /// The all-zero placeholder address
    pub fn unconfigured() -> Self {
        Self([0; 6])
    }

    /// Whether this is still the placeholder address
    pub fn is_unconfigured(&self) -> bool {
        self.0 == [0; 6]
    }

    /// The raw address bytes
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for PeripheralAddress {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        let hex: String = normalized.chars().filter(|c| *c != ':').collect();

        // Colons are optional but nothing else is tolerated
        let delimiters = normalized.chars().filter(|c| *c == ':').count();
        if hex.len() != 12
            || delimiters > 5
            || !hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(RelayError::InvalidAddress(s.to_string()));
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| RelayError::InvalidAddress(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for PeripheralAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl TryFrom<String> for PeripheralAddress {
    type Error = RelayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PeripheralAddress> for String {
    fn from(addr: PeripheralAddress) -> Self {
        addr.to_string()
    }
}

/// Main configuration for the waypost relay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Peripheral link settings
    #[serde(default)]
    pub peripheral: PeripheralConfig,

    /// Notification source settings
    #[serde(default)]
    pub sources: SourceConfig,

    /// Relay behavior settings
    #[serde(default)]
    pub relay: BehaviorConfig,

    /// Reconnection settings
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Peripheral identity and link sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeripheralConfig {
    /// Stored peripheral address, read at session start
    pub address: PeripheralAddress,

    /// Payload size requested from the transport
    #[serde(default = "default_payload_limit")]
    pub payload_limit: usize,

    /// Bounded wait for connect and discovery steps
    #[serde(with = "humantime_serde", default = "default_link_timeout")]
    pub link_timeout: Duration,
}

fn default_payload_limit() -> usize {
    DEFAULT_PAYLOAD_LIMIT
}

fn default_link_timeout() -> Duration {
    DEFAULT_LINK_TIMEOUT
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            address: PeripheralAddress::unconfigured(),
            payload_limit: DEFAULT_PAYLOAD_LIMIT,
            link_timeout: DEFAULT_LINK_TIMEOUT,
        }
    }
}

/// Which notification sources reach the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Application identities whose notifications are considered
    pub allowed_apps: HashSet<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let mut allowed_apps = HashSet::new();
        allowed_apps.insert(DEFAULT_NAVIGATION_APP.to_string());
        Self { allowed_apps }
    }
}

/// Relay behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Idle threshold after which a status refresh is sent
    #[serde(with = "humantime_serde", default = "default_idle_refresh")]
    pub idle_refresh: Duration,

    /// Directory for write-once icon renditions; `None` disables persistence
    #[serde(default)]
    pub icon_dir: Option<PathBuf>,

    /// Keep relaying while the host app is backgrounded
    #[serde(default = "default_background_service")]
    pub run_as_background_service: bool,
}

fn default_idle_refresh() -> Duration {
    DEFAULT_IDLE_REFRESH
}

fn default_background_service() -> bool {
    true
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            idle_refresh: DEFAULT_IDLE_REFRESH,
            icon_dir: None,
            run_as_background_service: true,
        }
    }
}

/// Reconnection behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection on link loss
    #[serde(default = "default_auto_reconnect")]
    pub enabled: bool,

    /// Initial delay before the first reconnection attempt
    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Maximum delay between reconnection attempts
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Maximum number of reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 0, // Infinite
        }
    }
}

/// Builder for [`RelayConfig`]
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the peripheral address
    pub fn peripheral_address(mut self, address: PeripheralAddress) -> Self {
        self.config.peripheral.address = address;
        self
    }

    /// Set the requested payload limit
    pub fn payload_limit(mut self, limit: usize) -> Self {
        self.config.peripheral.payload_limit = limit;
        self
    }

    /// Set the connect/discovery timeout
    pub fn link_timeout(mut self, timeout: Duration) -> Self {
        self.config.peripheral.link_timeout = timeout;
        self
    }

    /// Allow notifications from an application identity
    pub fn allow_app(mut self, app_id: impl Into<String>) -> Self {
        self.config.sources.allowed_apps.insert(app_id.into());
        self
    }

    /// Set the idle heartbeat threshold
    pub fn idle_refresh(mut self, threshold: Duration) -> Self {
        self.config.relay.idle_refresh = threshold;
        self
    }

    /// Set the icon persistence directory
    pub fn icon_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.relay.icon_dir = Some(dir.into());
        self
    }

    /// Enable or disable auto-reconnect
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.reconnect.enabled = enabled;
        self
    }

    /// Set the initial reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.initial_delay = delay;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RelayConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.peripheral.payload_limit, DEFAULT_PAYLOAD_LIMIT);
        assert!(config.peripheral.address.is_unconfigured());
        assert!(config.sources.allowed_apps.contains(DEFAULT_NAVIGATION_APP));
        assert!(config.reconnect.enabled);
        assert_eq!(config.relay.idle_refresh, Duration::from_secs(120));
    }

    #[test]
    fn test_config_builder() {
        let config = RelayConfigBuilder::new()
            .peripheral_address("24:0A:C4:13:58:EA".parse().unwrap())
            .payload_limit(247)
            .allow_app("org.example.nav")
            .auto_reconnect(false)
            .build();

        assert_eq!(
            config.peripheral.address.to_string(),
            "24:0A:C4:13:58:EA"
        );
        assert_eq!(config.peripheral.payload_limit, 247);
        assert!(config.sources.allowed_apps.contains("org.example.nav"));
        assert!(!config.reconnect.enabled);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = RelayConfigBuilder::new()
            .peripheral_address("24:0A:C4:13:58:EA".parse().unwrap())
            .idle_refresh(Duration::from_secs(90))
            .icon_dir("/var/lib/waypost/icons")
            .build();

        let json = serde_json::to_string(&config).unwrap();
        // Durations serialize human-readable, addresses canonical
        assert!(json.contains("\"1m 30s\""));
        assert!(json.contains("24:0A:C4:13:58:EA"));

        let back: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.relay.idle_refresh, Duration::from_secs(90));
        assert_eq!(back.peripheral.address, config.peripheral.address);
    }

    #[test]
    fn test_address_parse_canonical() {
        let addr: PeripheralAddress = "24:0A:C4:13:58:EA".parse().unwrap();
        assert_eq!(addr.to_string(), "24:0A:C4:13:58:EA");
        assert_eq!(addr.octets()[0], 0x24);
    }

    #[test]
    fn test_address_parse_lowercase_and_bare() {
        let colon: PeripheralAddress = "24:0a:c4:13:58:ea".parse().unwrap();
        let bare: PeripheralAddress = "240AC41358EA".parse().unwrap();
        assert_eq!(colon, bare);
        assert_eq!(bare.to_string(), "24:0A:C4:13:58:EA");
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!("not-a-mac".parse::<PeripheralAddress>().is_err());
        assert!("24:0A:C4:13:58".parse::<PeripheralAddress>().is_err());
        assert!("24:0A:C4:13:58:EA:FF".parse::<PeripheralAddress>().is_err());
        assert!("ZZ:0A:C4:13:58:EA".parse::<PeripheralAddress>().is_err());
    }

    #[test]
    fn test_unconfigured_address() {
        let addr: PeripheralAddress = UNCONFIGURED_ADDRESS.parse().unwrap();
        assert!(addr.is_unconfigured());
    }

    #[test]
    fn test_service_identities_are_distinct() {
        assert_ne!(DISPLAY_SERVICE_UUID, MESSAGE_CHANNEL_UUID);
        assert_ne!(MESSAGE_CHANNEL_UUID, STATUS_CHANNEL_UUID);
    }
}

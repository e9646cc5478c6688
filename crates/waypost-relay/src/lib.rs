//! Notification-to-Peripheral Navigation Relay
//!
//! This crate relays turn-by-turn navigation cues extracted from host
//! notifications to a small wireless display peripheral, keeping the shown
//! cue current while sending as little as possible.
//!
//! # Architecture
//!
//! The relay operates in four layers:
//!
//! 1. **Link Transport** - BLE (or mock) connection to the display
//! 2. **Session State Machine** - connect/discover/ready lifecycle
//! 3. **Frame Writer** - status and command-tagged message frames
//! 4. **Relay Controller** - parsing, dedup, heartbeat, orchestration
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // Enable the `ble` feature to use BleTransport
//! // Cargo.toml: waypost-relay = { version = "0.1", features = ["ble"] }
//!
//! use waypost_relay::{
//!     BleTransport, ConnectivitySignal, PowerSource, RelayConfigBuilder,
//!     RelayService,
//! };
//!
//! struct Battery;
//! impl PowerSource for Battery {
//!     fn power_level(&self) -> u8 {
//!         87
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfigBuilder::new()
//!         .peripheral_address("24:0A:C4:13:58:EA".parse()?)
//!         .icon_dir("/var/lib/waypost/icons")
//!         .build();
//!
//!     let (service, handle, status) =
//!         RelayService::new(config, BleTransport::new(), Battery);
//!     tokio::spawn(service.run());
//!
//!     // Feed notification events through `handle.notify(...)`,
//!     // radio changes through `handle.connectivity(...)`.
//!     println!("link: {}", *status.borrow());
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `ble` - Bluetooth Low Energy transport (requires `btleplug`)
//!
//! # Relay Flow
//!
//! 1. Notification event arrives from the OS collaborator
//! 2. Source allow-list gates non-navigation apps out
//! 3. CueParser extracts the five-field cue (or rejects silently)
//! 4. Icon bytes hash into the maneuver icon identity
//! 5. Fingerprint dedup skips unchanged cues
//! 6. FrameWriter transmits five command-tagged frames, all-or-nothing
//!
//! # Protocol Details
//!
//! The peripheral exposes one GATT service with two writable
//! characteristics:
//! - message channel: `[command_byte][payload]`, commands 1..=5
//! - status channel: `[power_byte][clock_text]`
//!
//! The requested payload limit is **500 bytes**; frames above the
//! negotiated limit are rejected before any write.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod frame;
pub mod icon_store;
pub mod link;
pub mod relay;
pub mod service;
pub mod test_utils;

// Re-exports for convenience
pub use config::{
    BehaviorConfig, PeripheralAddress, PeripheralConfig, ReconnectConfig, RelayConfig,
    RelayConfigBuilder, SourceConfig,
};
pub use error::{RelayError, Result};
pub use frame::{FieldCommand, FramePayload, FrameWriter};
pub use icon_store::IconStore;
pub use link::{
    ChannelHandle, Discovered, LinkSession, LinkState, LinkStateMachine, LinkTransport,
};
pub use relay::{
    ConnectivitySignal, NotificationEvent, PowerSource, RelayController, RelayStats,
};
pub use service::{RelayCommand, RelayHandle, RelayService};

#[cfg(feature = "ble")]
pub use link::BleTransport;

// Protocol constants re-exports
pub use config::{
    DEFAULT_IDLE_REFRESH, DEFAULT_NAVIGATION_APP, DEFAULT_PAYLOAD_LIMIT, DISPLAY_SERVICE_UUID,
    MESSAGE_CHANNEL_UUID, STATUS_CHANNEL_UUID,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_PAYLOAD_LIMIT, 500);
        assert_eq!(DEFAULT_IDLE_REFRESH.as_secs(), 120);
        assert_eq!(DEFAULT_NAVIGATION_APP, "com.google.android.apps.maps");
    }
}

//! Waypost Core - Cue model and content fingerprints for the relay engine
//!
//! This crate provides the pure, I/O-free pieces of the waypost navigation
//! relay: parsing free-form navigation notification text into a structured
//! [`NavigationCue`], deriving [`CueFingerprint`] identities for the dedup
//! gate, and hashing maneuver icons into stable [`IconId`] values.
//!
//! # Modules
//!
//! - [`cue`] - Navigation cue value type and the notification text parser
//! - [`fingerprint`] - Change-detection fingerprints
//! - [`icon`] - Icon source representations, content hashing and renditions
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```rust
//! use waypost_core::{CueFingerprint, CueParser};
//!
//! let cue = CueParser::parse(
//!     "500 m - Main Street",
//!     "2 min \u{b7} 500 m \u{b7} 14:32",
//! )
//! .unwrap();
//! assert_eq!(cue.remaining_distance, "500m");
//!
//! let fp = CueFingerprint::compute(&cue);
//! assert_eq!(fp, CueFingerprint::compute(&cue));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cue;
pub mod error;
pub mod fingerprint;
pub mod icon;

// Re-exports for convenience
pub use cue::{CueParser, NavigationCue};
pub use error::{CoreError, Result};
pub use fingerprint::CueFingerprint;
pub use icon::{
    hash_icon, IconAsset, IconId, IconPayload, IconSource, STORED_ICON_QUALITY, STORED_ICON_SIZE,
    UNKNOWN_ICON_ID,
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
        assert_eq!(UNKNOWN_ICON_ID, "Unknown");
        assert_eq!(STORED_ICON_SIZE, 92);
        assert_eq!(STORED_ICON_QUALITY, 90);
    }
}

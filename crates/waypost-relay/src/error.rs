//! Error types for relay and link operations
//!
//! The taxonomy follows the failure model of the relay path: parse
//! rejections are expected and silent, write-while-not-ready and link loss
//! are recoverable, an unsupported peripheral is fatal for the connection
//! attempt. No error in this module ever crashes the controller; every
//! failure degrades to "skip this update, try again on the next event".

use thiserror::Error;

use waypost_core::CoreError;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    // ===== Link Errors =====
    /// A write was attempted while the session is not `Ready`
    #[error("Link session is not ready")]
    NotReady,

    /// The link to the peripheral was lost mid-session
    #[error("Link lost: {0}")]
    LinkLost(String),

    /// Connecting to the peripheral failed
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed {
        /// Peripheral address
        address: String,
        /// Failure reason
        reason: String,
    },

    /// A bounded wait was exceeded during connect or discovery
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// The peripheral does not expose the required service/channels
    ///
    /// Fatal for this connection attempt; no retry without a fresh connect.
    #[error("Unsupported peripheral: missing {missing}")]
    UnsupportedPeripheral {
        /// Description of what was missing (service or characteristic)
        missing: String,
    },

    // ===== Frame Errors =====
    /// A frame exceeds the negotiated payload limit
    #[error("Frame too large: {size} bytes exceeds negotiated limit of {limit} bytes")]
    FrameTooLarge {
        /// Actual frame size
        size: usize,
        /// Negotiated payload limit
        limit: usize,
    },

    /// Transport-level write failure
    #[error("Write error: {0}")]
    WriteError(String),

    // ===== Configuration Errors =====
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The peripheral address is not a valid MAC-like pattern
    #[error("Invalid peripheral address: {0}")]
    InvalidAddress(String),

    // ===== Service Errors =====
    /// The relay service command channel is closed
    #[error("Relay channel closed")]
    ChannelClosed,

    // ===== Wrapped Errors =====
    /// Cue/icon processing error from waypost-core
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error wrapper (icon store, transport backends)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Check if this error is recoverable/retriable on a later event
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RelayError::NotReady
                | RelayError::LinkLost(_)
                | RelayError::Timeout { .. }
                | RelayError::ConnectFailed { .. }
                | RelayError::WriteError(_)
        )
    }

    /// Check if this failure should tear the session down
    pub fn is_link_loss(&self) -> bool {
        matches!(self, RelayError::LinkLost(_) | RelayError::WriteError(_))
    }

    /// Check if this is the expected, silent parse rejection
    pub fn is_not_a_cue(&self) -> bool {
        matches!(self, RelayError::Core(e) if e.is_not_a_cue())
    }

    /// Get an error code for logging/metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::NotReady => "NOT_READY",
            RelayError::LinkLost(_) => "LINK_LOST",
            RelayError::ConnectFailed { .. } => "CONNECT_FAILED",
            RelayError::Timeout { .. } => "TIMEOUT",
            RelayError::UnsupportedPeripheral { .. } => "UNSUPPORTED_PERIPHERAL",
            RelayError::FrameTooLarge { .. } => "FRAME_TOO_LARGE",
            RelayError::WriteError(_) => "WRITE_ERROR",
            RelayError::InvalidConfig(_) => "INVALID_CONFIG",
            RelayError::InvalidAddress(_) => "INVALID_ADDRESS",
            RelayError::ChannelClosed => "CHANNEL_CLOSED",
            RelayError::Core(_) => "CORE_ERROR",
            RelayError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

// Conversion from tokio mpsc send error
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RelayError {
    fn from(_err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RelayError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RelayError::NotReady.error_code(), "NOT_READY");
        assert_eq!(
            RelayError::Timeout { duration_ms: 5000 }.error_code(),
            "TIMEOUT"
        );
    }

    #[test]
    fn test_is_retriable() {
        assert!(RelayError::NotReady.is_retriable());
        assert!(RelayError::LinkLost("gatt error".into()).is_retriable());
        assert!(!RelayError::UnsupportedPeripheral {
            missing: "status channel".into()
        }
        .is_retriable());
    }

    #[test]
    fn test_is_link_loss() {
        assert!(RelayError::LinkLost("reset".into()).is_link_loss());
        assert!(RelayError::WriteError("gatt busy".into()).is_link_loss());
        assert!(!RelayError::NotReady.is_link_loss());
    }

    #[test]
    fn test_not_a_cue_wrapping() {
        let err: RelayError = CoreError::NotACue("empty title").into();
        assert!(err.is_not_a_cue());
        assert!(!RelayError::NotReady.is_not_a_cue());
    }
}

//! Error types for cue parsing and icon fingerprinting

use thiserror::Error;

/// Main error type for waypost-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===== Parse Errors =====
    /// The notification text is not a navigation cue
    ///
    /// This is an expected outcome, not a fault: most notifications from a
    /// navigation app (traffic alerts, download progress, ...) are not
    /// turn-by-turn cues. Callers should skip the event silently.
    #[error("not a navigation cue: {0}")]
    NotACue(&'static str),

    // ===== Icon Errors =====
    /// Icon image bytes could not be decoded
    #[error("Icon decode failed: {0}")]
    IconDecode(String),

    /// Icon raster dimensions do not match the pixel buffer
    #[error("Invalid icon raster: {width}x{height} does not fit {len} bytes")]
    InvalidRaster {
        /// Claimed width in pixels
        width: u32,
        /// Claimed height in pixels
        height: u32,
        /// Actual pixel buffer length
        len: usize,
    },

    /// Icon re-encoding (PNG/JPEG) failed
    #[error("Icon encode failed: {0}")]
    IconEncode(String),
}

impl CoreError {
    /// Check whether this is the expected parse rejection
    pub fn is_not_a_cue(&self) -> bool {
        matches!(self, CoreError::NotACue(_))
    }
}

/// Result type alias for waypost-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<image::ImageError> for CoreError {
    fn from(err: image::ImageError) -> Self {
        CoreError::IconDecode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_cue_is_expected() {
        assert!(CoreError::NotACue("empty title").is_not_a_cue());
        assert!(!CoreError::IconDecode("bad magic".into()).is_not_a_cue());
    }
}

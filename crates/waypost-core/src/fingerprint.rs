//! Content fingerprints for cue change detection
//!
//! A fingerprint is the concatenation of the five cue fields in fixed order
//! with no separators. It is used purely for equality comparison by the
//! relay's dedup gate and is never interpreted.
//!
//! Known limitation: because there are no field delimiters, two different
//! field-boundary splits could collide to the same fingerprint (`"12"+"3"`
//! vs `"1"+"23"`). The wire behavior of the deployed peripherals depends on
//! this exact derivation, so it is preserved as-is rather than fixed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cue::NavigationCue;

/// Derived identity of a cue, used solely for change detection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CueFingerprint(String);

impl CueFingerprint {
    /// Compute the fingerprint of a cue
    ///
    /// Field order is fixed: time, distance, arrival, location, icon id.
    pub fn compute(cue: &NavigationCue) -> Self {
        let mut s = String::with_capacity(
            cue.remaining_time.len()
                + cue.remaining_distance.len()
                + cue.estimated_arrival.len()
                + cue.location_label.len()
                + cue.maneuver_icon_id.len(),
        );
        s.push_str(&cue.remaining_time);
        s.push_str(&cue.remaining_distance);
        s.push_str(&cue.estimated_arrival);
        s.push_str(&cue.location_label);
        s.push_str(&cue.maneuver_icon_id);
        Self(s)
    }

    /// The raw fingerprint string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CueFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue() -> NavigationCue {
        NavigationCue {
            remaining_time: "2 min".into(),
            remaining_distance: "500m".into(),
            estimated_arrival: "14:32".into(),
            location_label: "City Caf".into(),
            maneuver_icon_id: "abc123".into(),
        }
    }

    #[test]
    fn test_fixed_field_order() {
        let fp = CueFingerprint::compute(&cue());
        assert_eq!(fp.as_str(), "2 min500m14:32City Cafabc123");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(CueFingerprint::compute(&cue()), CueFingerprint::compute(&cue()));
    }

    #[test]
    fn test_icon_change_changes_fingerprint() {
        let a = CueFingerprint::compute(&cue());
        let b = CueFingerprint::compute(&cue().with_icon("other"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_field_change_changes_fingerprint() {
        let mut other = cue();
        other.remaining_distance = "400m".into();
        assert_ne!(CueFingerprint::compute(&cue()), CueFingerprint::compute(&other));
    }
}

//! Navigation cue model and notification text parsing
//!
//! Navigation apps post free-form notification text; the title carries the
//! distance/ETA segment and the destination label separated by a dash, and
//! the body carries three middle-dot-delimited segments (time remaining,
//! distance remaining, arrival estimate).
//!
//! The parser is locale-tolerant in two ways:
//!
//! - it accepts either the plain dash or the en-dash glyph as the title
//!   separator (different locales render different glyphs), and
//! - it strips all non-ASCII code points so the peripheral's limited
//!   character set never receives bytes it cannot render.
//!
//! Parsing is pure and performs no I/O.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::icon::UNKNOWN_ICON_ID;

/// Primary title separator between the distance/ETA segment and the label
const TITLE_SEPARATOR: &str = " - ";

/// Fallback separator; some locales render an en dash instead
const TITLE_SEPARATOR_ALT: &str = " \u{2013} ";

/// Separator between the three body segments
const BODY_SEPARATOR: &str = " \u{b7} ";

/// Localized prefix in front of the arrival estimate ("Prihod:" = "Arrival:")
const ARRIVAL_PREFIX: &str = "Prihod: ";

/// One structured turn-by-turn navigation update
///
/// Immutable value type: produced once per qualifying notification and never
/// mutated afterwards. All fields are ASCII-only; non-ASCII code points are
/// stripped during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationCue {
    /// Time remaining to the destination (e.g. "2 min")
    pub remaining_time: String,
    /// Distance remaining, with the unit space collapsed (e.g. "500m")
    pub remaining_distance: String,
    /// Estimated time of arrival (e.g. "14:32")
    pub estimated_arrival: String,
    /// Destination label, trimmed (e.g. "City Caf")
    pub location_label: String,
    /// Content identity of the maneuver icon, or `"Unknown"` when the
    /// notification carried no usable icon
    pub maneuver_icon_id: String,
}

impl NavigationCue {
    /// Attach an icon identity to a parsed cue
    ///
    /// The parser has no access to the icon collaborator, so parsed cues
    /// start out with the `"Unknown"` icon id and the caller fills it in
    /// once the icon has been hashed.
    pub fn with_icon(mut self, icon_id: impl Into<String>) -> Self {
        self.maneuver_icon_id = icon_id.into();
        self
    }
}

/// Parser turning raw notification title/body text into a [`NavigationCue`]
///
/// Stateless; all methods are associated functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CueParser;

impl CueParser {
    /// Parse a notification title/body pair into a structured cue
    ///
    /// Returns [`CoreError::NotACue`] when the title is empty or the body
    /// does not split into exactly three middle-dot segments. Rejection is
    /// the common case and callers are expected to skip such events
    /// silently.
    pub fn parse(title: &str, body: &str) -> Result<NavigationCue> {
        if title.is_empty() {
            return Err(CoreError::NotACue("empty title"));
        }

        let segments: Vec<&str> = body.split(BODY_SEPARATOR).collect();
        if segments.len() != 3 {
            return Err(CoreError::NotACue("body does not have three segments"));
        }

        let remaining_time = strip_non_ascii(segments[0]);
        let remaining_distance = collapse_unit_spaces(&strip_non_ascii(segments[1]));
        let arrival = strip_non_ascii(segments[2]);
        let estimated_arrival = arrival
            .strip_prefix(ARRIVAL_PREFIX)
            .unwrap_or(&arrival)
            .to_string();

        Ok(NavigationCue {
            remaining_time,
            remaining_distance,
            estimated_arrival,
            location_label: Self::parse_label(title),
            maneuver_icon_id: UNKNOWN_ICON_ID.to_string(),
        })
    }

    /// Extract the destination label from the title
    ///
    /// The title reads `<distance/ETA> <sep> <destination>`; the label is the
    /// destination side of the first separator occurrence. A title without
    /// either separator glyph is taken as a bare label.
    fn parse_label(title: &str) -> String {
        let label = title
            .split_once(TITLE_SEPARATOR)
            .or_else(|| title.split_once(TITLE_SEPARATOR_ALT))
            .map(|(_, destination)| destination)
            .unwrap_or(title);

        collapse_unit_spaces(&strip_non_ascii(label))
            .trim()
            .to_string()
    }
}

/// Remove every non-ASCII code point from the input
fn strip_non_ascii(input: &str) -> String {
    input.chars().filter(char::is_ascii).collect()
}

/// Collapse `" m"` / `" km"` unit spacing so the peripheral renders `500m`
fn collapse_unit_spaces(input: &str) -> String {
    input.replace(" km", "km").replace(" m", "m")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_dash_title() {
        let cue = CueParser::parse(
            "500 m - Main Street",
            "2 min \u{b7} 500 m \u{b7} 14:32",
        )
        .unwrap();
        assert_eq!(cue.location_label, "Main Street");
        assert_eq!(cue.remaining_time, "2 min");
        assert_eq!(cue.remaining_distance, "500m");
        assert_eq!(cue.estimated_arrival, "14:32");
        assert_eq!(cue.maneuver_icon_id, "Unknown");
    }

    #[test]
    fn test_ascii_sanitation() {
        let cue = CueParser::parse(
            "5 min \u{2013} City Caf\u{e9}",
            "2 min \u{b7} 500 m \u{b7} Prihod: 14:32",
        )
        .unwrap();
        assert_eq!(cue.location_label, "City Caf");
        assert_eq!(cue.remaining_time, "2 min");
        assert_eq!(cue.remaining_distance, "500m");
        assert_eq!(cue.estimated_arrival, "14:32");
    }

    #[test]
    fn test_separator_fallback_equivalence() {
        let body = "1 min \u{b7} 200 m \u{b7} 09:15";
        let plain = CueParser::parse("200 m - Old Square", body).unwrap();
        let en_dash = CueParser::parse("200 m \u{2013} Old Square", body).unwrap();
        assert_eq!(plain, en_dash);
    }

    #[test]
    fn test_splits_on_first_separator_only() {
        let cue = CueParser::parse(
            "300 m - Foo - Bar",
            "1 min \u{b7} 300 m \u{b7} 10:00",
        )
        .unwrap();
        assert_eq!(cue.location_label, "Foo - Bar");
    }

    #[test]
    fn test_title_without_separator_is_bare_label() {
        let cue = CueParser::parse("Rerouting", "1 min \u{b7} 1 km \u{b7} 10:00").unwrap();
        assert_eq!(cue.location_label, "Rerouting");
        assert_eq!(cue.remaining_distance, "1km");
    }

    #[test]
    fn test_km_unit_collapse() {
        let cue = CueParser::parse(
            "2 km - Ring Road",
            "4 min \u{b7} 2 km \u{b7} 11:05",
        )
        .unwrap();
        assert_eq!(cue.remaining_distance, "2km");
    }

    #[test]
    fn test_two_segment_body_rejected() {
        let err = CueParser::parse("500 m - Somewhere", "2 min \u{b7} 500 m").unwrap_err();
        assert!(err.is_not_a_cue());
    }

    #[test]
    fn test_four_segment_body_rejected() {
        let err = CueParser::parse(
            "500 m - Somewhere",
            "2 min \u{b7} 500 m \u{b7} 14:32 \u{b7} extra",
        )
        .unwrap_err();
        assert!(err.is_not_a_cue());
    }

    #[test]
    fn test_empty_title_rejected() {
        let err = CueParser::parse("", "2 min \u{b7} 500 m \u{b7} 14:32").unwrap_err();
        assert!(err.is_not_a_cue());
    }

    #[test]
    fn test_arrival_prefix_only_stripped_when_present() {
        let cue = CueParser::parse(
            "500 m - Somewhere",
            "2 min \u{b7} 500 m \u{b7} 14:32",
        )
        .unwrap();
        assert_eq!(cue.estimated_arrival, "14:32");
    }

    #[test]
    fn test_with_icon() {
        let cue = CueParser::parse("500 m - X", "2 min \u{b7} 500 m \u{b7} 14:32")
            .unwrap()
            .with_icon("abc123");
        assert_eq!(cue.maneuver_icon_id, "abc123");
    }
}

//! Integration tests for the pure cue pipeline: parse, hash, fingerprint.

use waypost_core::{hash_icon, CueFingerprint, CueParser, IconAsset, IconSource};

fn flat_icon(fill: u8) -> IconSource {
    IconSource::Raster {
        pixels: vec![fill; 16 * 16 * 4],
        width: 16,
        height: 16,
    }
}

#[test]
fn test_parse_hash_fingerprint_pipeline() {
    let cue = CueParser::parse(
        "5 min \u{2013} City Caf\u{e9}",
        "5 min \u{b7} 1.2 km \u{b7} Prihod: 09:15",
    )
    .unwrap();
    assert_eq!(cue.location_label, "City Caf");
    assert_eq!(cue.remaining_distance, "1.2km");
    assert_eq!(cue.estimated_arrival, "09:15");

    let icon_id = hash_icon(&flat_icon(60)).unwrap();
    let cue = cue.with_icon(icon_id.as_str());

    let fp = CueFingerprint::compute(&cue);
    assert_eq!(
        fp.as_str(),
        format!("5 min1.2km09:15City Caf{}", icon_id)
    );
}

#[test]
fn test_icon_change_alone_changes_fingerprint() {
    let cue = CueParser::parse("500 m - Main Street", "2 min \u{b7} 500 m \u{b7} 14:32").unwrap();

    let a = cue
        .clone()
        .with_icon(hash_icon(&flat_icon(10)).unwrap().as_str());
    let b = cue.with_icon(hash_icon(&flat_icon(250)).unwrap().as_str());
    assert_ne!(CueFingerprint::compute(&a), CueFingerprint::compute(&b));
}

#[test]
fn test_asset_id_matches_source_hash() {
    let source = flat_icon(128);
    let asset = IconAsset::from_source(&source).unwrap();
    assert_eq!(asset.id, hash_icon(&source).unwrap());
    // Stored rendition is JPEG regardless of the source representation
    assert_eq!(&asset.jpeg[..2], &[0xFF, 0xD8]);
}

#[test]
fn test_rejections_are_silent_skips() {
    for (title, body) in [
        ("", "2 min \u{b7} 500 m \u{b7} 14:32"),
        ("500 m - X", "no separators here"),
        ("500 m - X", "2 min \u{b7} 500 m"),
    ] {
        let err = CueParser::parse(title, body).unwrap_err();
        assert!(err.is_not_a_cue(), "{:?} should be a silent skip", err);
    }
}

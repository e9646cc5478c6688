//! Maneuver icon identity and persistence renditions
//!
//! Notification icons arrive in one of two source representations: already
//! encoded image bytes (the rendered-drawable path) or a raw RGBA raster
//! (the bitmap path). Both hash to an [`IconId`]: the image is desaturated
//! to a single channel, re-encoded as lossless PNG, and digested with
//! SHA-256. The hex rendering drops leading zeros, matching the big-integer
//! rendering the deployed peripherals already key on.
//!
//! Two visually identical icons delivered through the two different source
//! representations may legitimately hash differently; callers must attempt
//! the primary representation and fall back to the secondary only on
//! extraction failure, never hash both.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;

use crate::error::{CoreError, Result};

/// Icon identity used when no usable icon accompanied the notification
pub const UNKNOWN_ICON_ID: &str = "Unknown";

/// Edge length of the persisted icon rendition, in pixels
pub const STORED_ICON_SIZE: u32 = 92;

/// JPEG quality of the persisted icon rendition
pub const STORED_ICON_QUALITY: u8 = 90;

/// Content identity of a maneuver icon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconId(String);

impl IconId {
    /// The placeholder identity for a missing icon
    pub fn unknown() -> Self {
        Self(UNKNOWN_ICON_ID.to_string())
    }

    /// The identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the missing-icon placeholder
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_ICON_ID
    }
}

impl fmt::Display for IconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One source representation of a notification icon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// Already encoded image bytes (PNG/JPEG/...)
    Encoded(Vec<u8>),
    /// Raw RGBA8 raster
    Raster {
        /// Pixel data, 4 bytes per pixel, row-major
        pixels: Vec<u8>,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

impl IconSource {
    /// Decode this source into an image
    fn decode(&self) -> Result<DynamicImage> {
        match self {
            IconSource::Encoded(bytes) => Ok(image::load_from_memory(bytes)?),
            IconSource::Raster {
                pixels,
                width,
                height,
            } => {
                let buf = RgbaImage::from_raw(*width, *height, pixels.clone()).ok_or(
                    CoreError::InvalidRaster {
                        width: *width,
                        height: *height,
                        len: pixels.len(),
                    },
                )?;
                Ok(DynamicImage::ImageRgba8(buf))
            }
        }
    }
}

/// An icon source with an optional secondary representation
///
/// Mirrors the two extraction paths of the notification collaborator: the
/// rendered drawable is tried first, the raw bitmap only when rendering
/// failed. The fallback is never consulted when the primary extracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPayload {
    /// Preferred representation
    pub primary: IconSource,
    /// Secondary representation, tried only on primary extraction failure
    pub fallback: Option<IconSource>,
}

impl IconPayload {
    /// Payload with a single representation
    pub fn single(source: IconSource) -> Self {
        Self {
            primary: source,
            fallback: None,
        }
    }

    /// Compute the icon identity, falling back on extraction failure only
    pub fn content_id(&self) -> Result<IconId> {
        match hash_icon(&self.primary) {
            Ok(id) => Ok(id),
            Err(primary_err) => match &self.fallback {
                Some(fallback) => hash_icon(fallback),
                None => Err(primary_err),
            },
        }
    }

    /// Produce the persistable asset, with the same fallback rule
    pub fn to_asset(&self) -> Result<IconAsset> {
        match IconAsset::from_source(&self.primary) {
            Ok(asset) => Ok(asset),
            Err(primary_err) => match &self.fallback {
                Some(fallback) => IconAsset::from_source(fallback),
                None => Err(primary_err),
            },
        }
    }
}

/// A persistable icon rendition plus its content identity
///
/// The stored rendition is a fixed-size JPEG; the identity is derived from
/// the lossless desaturated form, not from the stored bytes, so re-encoding
/// artifacts never change the id.
#[derive(Debug, Clone)]
pub struct IconAsset {
    /// Content identity
    pub id: IconId,
    /// JPEG bytes of the stored rendition
    pub jpeg: Vec<u8>,
}

impl IconAsset {
    /// Build the asset from a single source representation
    pub fn from_source(source: &IconSource) -> Result<Self> {
        let img = source.decode()?;
        let id = hash_image(&img);

        let resized = img.resize_exact(STORED_ICON_SIZE, STORED_ICON_SIZE, FilterType::Triangle);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
        let mut jpeg = Vec::new();
        let mut cursor = Cursor::new(&mut jpeg);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, STORED_ICON_QUALITY);
        rgb.write_with_encoder(encoder)
            .map_err(|e| CoreError::IconEncode(e.to_string()))?;

        Ok(Self { id, jpeg })
    }
}

/// Hash a single icon source into its content identity
///
/// Desaturates to a single channel, encodes lossless PNG, digests with
/// SHA-256 and renders lowercase hex without fixed-width zero padding.
pub fn hash_icon(source: &IconSource) -> Result<IconId> {
    Ok(hash_image(&source.decode()?))
}

fn hash_image(img: &DynamicImage) -> IconId {
    let gray = DynamicImage::ImageLuma8(img.to_luma8());

    let mut png = Vec::new();
    // PNG encoding of an in-memory luma buffer cannot fail
    if gray
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .is_err()
    {
        return IconId::unknown();
    }

    let digest = Sha256::digest(&png);
    let hex = hex::encode(digest);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        IconId(String::from("0"))
    } else {
        IconId(trimmed.to_string())
    }
}

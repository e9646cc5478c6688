//! Write-once persistence for maneuver icon renditions
//!
//! Icon files are named by content identity, so an existing file for a
//! given id is already the correct bytes and is never overwritten.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use waypost_core::IconAsset;

use crate::error::Result;

/// File name prefix of persisted icon renditions
const ICON_FILE_PREFIX: &str = "navigacija-";

/// Stores icon renditions keyed by their content identity
#[derive(Debug, Clone)]
pub struct IconStore {
    dir: PathBuf,
}

impl IconStore {
    /// Create a store rooted at `dir` (created lazily on first persist)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path an asset with this id would be stored at
    pub fn path_for(&self, icon_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}.jpg", ICON_FILE_PREFIX, icon_id))
    }

    /// Persist an asset, skipping if a file for its id already exists
    pub fn persist(&self, asset: &IconAsset) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(asset.id.as_str());
        if path.exists() {
            debug!("Icon {} already stored, skipping", asset.id);
            return Ok(path);
        }
        fs::write(&path, &asset.jpeg)?;
        debug!("Stored icon {} ({} bytes)", asset.id, asset.jpeg.len());
        Ok(path)
    }

    /// The store's root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_core::{IconAsset, IconSource};

    fn asset() -> IconAsset {
        let source = IconSource::Raster {
            pixels: vec![128; 8 * 8 * 4],
            width: 8,
            height: 8,
        };
        IconAsset::from_source(&source).unwrap()
    }

    #[test]
    fn test_persist_names_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = IconStore::new(dir.path());
        let asset = asset();
        let path = store.persist(&asset).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("navigacija-{}.jpg", asset.id)
        );
        assert_eq!(fs::read(&path).unwrap(), asset.jpeg);
    }

    #[test]
    fn test_persist_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = IconStore::new(dir.path());
        let asset = asset();
        let path = store.persist(&asset).unwrap();

        // Clobber the stored bytes; a second persist must not restore them
        fs::write(&path, b"sentinel").unwrap();
        store.persist(&asset).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"sentinel");
    }
}

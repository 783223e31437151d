use std::fs;
use std::path::PathBuf;

use log::warn;

use crate::config::GalleryConfig;
use crate::errors::AppResult;
use crate::media::MediaItem;

/// Local JSON store that stands in for the gallery while no upload preset
/// is configured. Items are kept newest first, matching the remote feed.
pub struct FallbackStore {
    path: PathBuf,
}

impl FallbackStore {
    pub fn new(path: PathBuf) -> Self {
        FallbackStore { path }
    }

    /// Opens the store at the configured location. The parent directory
    /// is created by [`GalleryConfig::fallback_store_file`].
    pub fn open(config: &GalleryConfig) -> AppResult<Self> {
        let path = config.fallback_store_file()?;
        Ok(FallbackStore::new(path))
    }

    /// Reads all stored items. A missing file is an empty gallery; a
    /// corrupt one is logged and treated as empty.
    pub fn load(&self) -> Vec<MediaItem> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    "Fallback store at {} is unreadable, starting empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Inserts an item at the front of the store and persists the result.
    pub fn prepend(&self, item: MediaItem) -> AppResult<()> {
        let mut items = self.load();
        items.insert(0, item);
        self.persist(&items)
    }

    fn persist(&self, items: &[MediaItem]) -> AppResult<()> {
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

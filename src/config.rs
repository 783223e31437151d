use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Preset placeholder left by the gallery template. Until it is replaced
/// with a real Cloudinary preset, every operation runs against the local
/// fallback store.
pub const UNCONFIGURED_PRESET: &str = "TU_UPLOAD_PRESET_AQUÍ";

/// Key under which the fallback gallery is persisted.
pub const FALLBACK_STORE_KEY: &str = "wedding_memories_fallback";

const DEFAULT_RES_BASE: &str = "https://res.cloudinary.com";
const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Cloudinary account (cloud name) hosting the gallery.
    pub cloud_name: String,
    /// Unsigned upload preset; [`UNCONFIGURED_PRESET`] disables the cloud.
    pub upload_preset: String,
    /// Tag scoping which assets belong to this gallery.
    pub tag: String,
    pub poll_interval_secs: u64,
    pub jpeg_quality: u8,
    /// Images below this byte size are uploaded as-is.
    pub compress_threshold_bytes: u64,
    /// Bounding box (longer side) for recompressed images.
    pub max_dimension: u32,
    pub res_base: String,
    pub api_base: String,
    /// Overrides the platform data directory for the fallback store.
    pub fallback_store_path: Option<PathBuf>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            cloud_name: "dzmwybq2v".to_string(),
            upload_preset: "boda_preset".to_string(),
            tag: "boda_rocio_matias".to_string(),
            poll_interval_secs: 10,
            jpeg_quality: 80,
            compress_threshold_bytes: 1024 * 1024,
            max_dimension: 1200,
            res_base: DEFAULT_RES_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            fallback_store_path: None,
        }
    }
}

impl GalleryConfig {
    /// False while the upload preset is still the template placeholder.
    pub fn is_cloud_active(&self) -> bool {
        self.upload_preset != UNCONFIGURED_PRESET
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Listing endpoint for the gallery tag. Cloudinary serves the tag
    /// listing under the `image` delivery type for every resource type.
    pub fn listing_url(&self) -> String {
        format!(
            "{}/{}/image/list/{}.json",
            self.res_base, self.cloud_name, self.tag
        )
    }

    pub fn upload_url(&self, resource_type: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.api_base, self.cloud_name, resource_type
        )
    }

    /// Delivery address for a hosted asset, with automatic format and
    /// quality negotiation.
    pub fn delivery_url(&self, resource_type: &str, public_id: &str, format: &str) -> String {
        format!(
            "{}/{}/{}/upload/f_auto,q_auto/{}.{}",
            self.res_base, self.cloud_name, resource_type, public_id, format
        )
    }

    /// Resolves the fallback store file, creating its directory if needed.
    pub fn fallback_store_file(&self) -> AppResult<PathBuf> {
        if let Some(path) = &self.fallback_store_path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| AppError::Config("Could not find data directory".to_string()))?
            .join("recuerdos");

        fs::create_dir_all(&data_dir)?;
        Ok(data_dir.join(format!("{}.json", FALLBACK_STORE_KEY)))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.tag.trim().is_empty() {
            return Err(AppError::validation("tag", "Gallery tag cannot be empty"));
        }

        if self.is_cloud_active() && self.cloud_name.trim().is_empty() {
            return Err(AppError::validation(
                "cloud_name",
                "Cloud name cannot be empty when an upload preset is configured",
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(AppError::validation(
                "poll_interval_secs",
                "Must be at least 1 second",
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(AppError::validation(
                "jpeg_quality",
                "Must be between 1 and 100",
            ));
        }

        if self.compress_threshold_bytes == 0 {
            return Err(AppError::validation(
                "compress_threshold_bytes",
                "Must be greater than 0",
            ));
        }

        if self.max_dimension == 0 {
            return Err(AppError::validation(
                "max_dimension",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join("recuerdos");

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<GalleryConfig> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        let config_str = fs::read_to_string(&config_path)?;
        let config: GalleryConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse config file: {}. Using defaults.", e);
            GalleryConfig::default()
        });

        config.validate()?;

        Ok(config)
    } else {
        let default_config = GalleryConfig::default();
        save_config_internal(&default_config)?;
        Ok(default_config)
    }
}

pub fn save_config(config: &GalleryConfig) -> AppResult<()> {
    config.validate()?;
    save_config_internal(config)
}

fn save_config_internal(config: &GalleryConfig) -> AppResult<()> {
    let config_path = get_config_path()?;

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_str)?;

    log::info!("Configuration saved to {}", config_path.display());
    Ok(())
}

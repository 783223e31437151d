use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::config::GalleryConfig;
use crate::errors::{AppError, AppResult};
use crate::fallback::FallbackStore;
use crate::image_processor::{self, LoadedMedia};
use crate::media::{MediaItem, MediaKind, DEFAULT_AUTHOR, DEFAULT_DEDICATION};

use super::cloudinary_client::{CloudinaryClient, UploadReceipt};

/// A guest's submission: the file plus whatever they typed into the form.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub author: String,
    pub dedication: String,
}

/// Where a submission ended up.
#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded(UploadReceipt),
    SavedLocally(MediaItem),
}

/// Drives a submission through compression and upload, or into the local
/// store while the gallery has no upload preset configured.
pub struct Uploader {
    config: GalleryConfig,
    client: CloudinaryClient,
    store: FallbackStore,
}

impl Uploader {
    pub fn new(config: GalleryConfig) -> AppResult<Self> {
        config.validate()?;
        let store = FallbackStore::open(&config)?;
        let client = CloudinaryClient::new(config.clone());

        Ok(Uploader {
            config,
            client,
            store,
        })
    }

    pub async fn submit(&self, request: UploadRequest) -> AppResult<UploadOutcome> {
        if !request.path.exists() {
            return Err(AppError::file_not_found(&request.path.to_string_lossy()));
        }

        let media = LoadedMedia::read(&request.path).await?;

        if !self.config.is_cloud_active() {
            let item = self.save_locally(media, &request)?;
            return Ok(UploadOutcome::SavedLocally(item));
        }

        // The resource kind comes from the original file. Compression may
        // rewrite the MIME type, but never turns a video into an image.
        let kind = MediaKind::from_mime(&media.mime_type);
        let prepared = image_processor::prepare_for_upload(media, &self.config);

        let context = build_context(&request.author, &request.dedication);
        let receipt = self.client.upload(&prepared, &context, kind).await?;

        Ok(UploadOutcome::Uploaded(receipt))
    }

    /// Keeps the submission as a data URL in the fallback store. The file
    /// goes in uncompressed; compression only runs on the upload path.
    fn save_locally(&self, media: LoadedMedia, request: &UploadRequest) -> AppResult<MediaItem> {
        log::info!(
            "No upload preset configured, keeping {} in the local store",
            media.file_name
        );

        let url = format!(
            "data:{};base64,{}",
            media.mime_type,
            STANDARD.encode(&media.bytes)
        );

        let item = MediaItem {
            id: format!("local_{}", Uuid::new_v4().simple()),
            url,
            kind: MediaKind::from_mime(&media.mime_type),
            author: or_default(&request.author, DEFAULT_AUTHOR),
            dedication: or_default(&request.dedication, DEFAULT_DEDICATION),
            timestamp: Utc::now().timestamp_millis(),
        };

        self.store.prepend(item.clone())?;
        Ok(item)
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Builds the metadata string sent alongside an upload. Empty fields fall
/// back to the shared defaults before sanitizing.
pub fn build_context(author: &str, dedication: &str) -> String {
    format!(
        "author={}|dedication={}",
        sanitize_metadata(or_default(author, DEFAULT_AUTHOR).as_str()),
        sanitize_metadata(or_default(dedication, DEFAULT_DEDICATION).as_str())
    )
}

/// `=` and `|` delimit context pairs on the wire, so they become spaces
/// and the result is trimmed.
pub fn sanitize_metadata(value: &str) -> String {
    let delimiters = Regex::new(r"[=|]").unwrap();
    delimiters.replace_all(value, " ").trim().to_string()
}

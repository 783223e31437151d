use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GalleryConfig;
use crate::errors::AppResult;

/// Shown when a guest uploaded without giving a name.
pub const DEFAULT_AUTHOR: &str = "Invitado Anónimo";

/// Shown when a guest uploaded without writing a dedication.
pub const DEFAULT_DEDICATION: &str = "¡Felicidades a los novios!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// One gallery entry, as delivered to feed observers and as persisted in
/// the fallback store (field names match the stored JSON shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub author: String,
    pub dedication: String,
    /// Milliseconds since epoch; the feed sort key.
    pub timestamp: i64,
}

/// Response body of the tag listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TaggedListResponse {
    pub resources: Vec<TaggedResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaggedResource {
    pub public_id: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub format: String,
    #[serde(default)]
    pub context: Option<ResourceContext>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceContext {
    #[serde(default)]
    pub custom: Option<CustomContext>,
}

/// User-supplied metadata attached at upload time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomContext {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub dedication: Option<String>,
}

impl TaggedResource {
    pub fn into_media_item(self, config: &GalleryConfig) -> MediaItem {
        // The host omits resource_type for plain image uploads.
        let resource_type = self.resource_type.unwrap_or_else(|| "image".to_string());
        let custom = self.context.and_then(|c| c.custom).unwrap_or_default();

        let kind = if resource_type == "video" {
            MediaKind::Video
        } else {
            MediaKind::Image
        };

        MediaItem {
            url: config.delivery_url(&resource_type, &self.public_id, &self.format),
            id: self.public_id,
            kind,
            // Empty strings collapse to the defaults, like missing context.
            author: custom
                .author
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            dedication: custom
                .dedication
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_DEDICATION.to_string()),
            timestamp: self.created_at.timestamp_millis(),
        }
    }
}

/// Parses a listing body into the feed delivered to observers: every
/// resource mapped to a [`MediaItem`], newest first.
pub fn parse_listing(config: &GalleryConfig, body: &str) -> AppResult<Vec<MediaItem>> {
    let listing: TaggedListResponse = serde_json::from_str(body)?;

    let mut items: Vec<MediaItem> = listing
        .resources
        .into_iter()
        .map(|resource| resource.into_media_item(config))
        .collect();

    sort_newest_first(&mut items);
    Ok(items)
}

pub fn sort_newest_first(items: &mut [MediaItem]) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

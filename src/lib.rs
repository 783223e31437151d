//! Client library for a shared wedding gallery hosted on Cloudinary.
//!
//! Guests upload photos and videos into a common tagged gallery; every
//! device polls the public tag listing and shows the same feed. While no
//! upload preset is configured yet, submissions land in a local store
//! instead, so nothing a guest shares is lost before the gallery is live.

pub mod config;
pub mod errors;
pub mod fallback;
pub mod image_processor;
pub mod media;
pub mod poller;
pub mod uploader;

pub use config::{load_config, save_config, GalleryConfig};
pub use errors::{AppError, AppResult};
pub use fallback::FallbackStore;
pub use image_processor::LoadedMedia;
pub use media::{MediaItem, MediaKind};
pub use poller::{FeedPoller, PollHandle, PollOutcome, SkipReason};
pub use uploader::{UploadOutcome, UploadRequest, Uploader};

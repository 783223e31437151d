// Upload side of the gallery: takes a guest's file and metadata and gets
// it into the shared Cloudinary gallery, or into the local fallback store
// while no upload preset is configured.

pub mod cloudinary_client;
pub mod submission;

pub use cloudinary_client::{CloudinaryClient, ListingOutcome, UploadReceipt};
pub use submission::{UploadOutcome, UploadRequest, Uploader};

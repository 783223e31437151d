use std::cmp::min;

use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tokio::time::{sleep, Duration};

use crate::config::GalleryConfig;
use crate::errors::{AppError, AppResult};
use crate::image_processor::LoadedMedia;
use crate::media::MediaKind;

/// Shown to guests when the upload error body carries no message of its own.
pub const UPLOAD_FAILED_FALLBACK_MESSAGE: &str = "Error al subir a Cloudinary";

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(120),
            exponential_base: 2.0,
        }
    }
}

/// Result of a listing fetch: the JSON payload, or the status the host
/// rejected the request with.
#[derive(Debug)]
pub enum ListingOutcome {
    Payload(String),
    Rejected(StatusCode),
}

/// Relevant fields of the host's upload response.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub public_id: String,
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Client for the unsigned upload API and the public tag listing.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: GalleryConfig,
    retry_config: RetryConfig,
}

impl CloudinaryClient {
    pub fn new(config: GalleryConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap(),
            config,
            retry_config: RetryConfig::default(),
        }
    }

    /// Fetches the tag listing. The timestamp query defeats any cached
    /// copy between polls.
    pub async fn list_tagged(&self) -> AppResult<ListingOutcome> {
        let url = format!(
            "{}?t={}",
            self.config.listing_url(),
            Utc::now().timestamp_millis()
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Ok(ListingOutcome::Rejected(status));
        }

        Ok(ListingOutcome::Payload(response.text().await?))
    }

    /// Uploads one file through the unsigned upload endpoint, retrying
    /// transient failures with exponential backoff.
    pub async fn upload(
        &self,
        media: &LoadedMedia,
        context: &str,
        kind: MediaKind,
    ) -> AppResult<UploadReceipt> {
        let url = self.config.upload_url(kind.as_str());
        let mut attempt = 0;

        loop {
            let form = build_upload_form(media, context, &self.config)?;
            let response = self.client.post(&url).multipart(form).send().await?;
            let status = response.status();

            if status.is_success() {
                let receipt: UploadReceipt = response.json().await?;
                log::info!("Uploaded {} as {}", media.file_name, receipt.public_id);
                return Ok(receipt);
            }

            let error_text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&error_text);

            attempt += 1;
            if should_retry_status(status.as_u16()) && attempt <= self.retry_config.max_retries {
                let delay = self.backoff_delay(attempt);
                log::warn!(
                    "Upload attempt {} for {} failed with {}, retrying in {:?}",
                    attempt,
                    media.file_name,
                    status,
                    delay
                );
                sleep(delay).await;
                continue;
            }

            log::error!(
                "Upload of {} failed with {}: {}",
                media.file_name,
                status,
                message
            );
            return Err(AppError::upload_failed(message));
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.retry_config.base_delay.as_millis() as f64
            * self.retry_config.exponential_base.powi(attempt as i32 - 1);

        min(
            Duration::from_millis(delay_ms as u64),
            self.retry_config.max_delay,
        )
    }
}

fn build_upload_form(
    media: &LoadedMedia,
    context: &str,
    config: &GalleryConfig,
) -> AppResult<multipart::Form> {
    let part = multipart::Part::bytes(media.bytes.clone())
        .file_name(media.file_name.clone())
        .mime_str(&media.mime_type)?;

    Ok(multipart::Form::new()
        .part("file", part)
        .text("upload_preset", config.upload_preset.clone())
        .text("tags", config.tag.clone())
        .text("context", context.to_string()))
}

/// Pulls the human-readable message out of an error body shaped like
/// `{"error": {"message": "..."}}`.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| UPLOAD_FAILED_FALLBACK_MESSAGE.to_string())
}

fn should_retry_status(status_code: u16) -> bool {
    matches!(status_code, 429 | 500 | 502 | 503 | 504)
}

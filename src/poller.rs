use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::config::GalleryConfig;
use crate::errors::AppResult;
use crate::fallback::FallbackStore;
use crate::media::{self, MediaItem};
use crate::uploader::cloudinary_client::{CloudinaryClient, ListingOutcome};

/// Why a poll cycle delivered nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    HttpStatus(u16),
    Transport(String),
    MalformedPayload(String),
}

/// What a single poll cycle did. A skipped cycle leaves the previously
/// delivered feed in place; the next cycle retries on the same interval.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Updated(Vec<MediaItem>),
    Skipped(SkipReason),
}

/// Periodically fetches the tag listing and hands each successful snapshot
/// to the observer. Every delivery replaces the previous one wholesale;
/// there is no merging with earlier snapshots.
pub struct FeedPoller {
    config: GalleryConfig,
    client: CloudinaryClient,
}

impl FeedPoller {
    pub fn new(config: GalleryConfig) -> AppResult<Self> {
        config.validate()?;
        let client = CloudinaryClient::new(config.clone());
        Ok(FeedPoller { config, client })
    }

    /// Starts delivering feed snapshots to `on_update`.
    ///
    /// Without an upload preset configured, the local store's contents are
    /// delivered once, synchronously, and the returned handle is already
    /// stopped. Otherwise a poll loop runs on the configured interval,
    /// fetching immediately, until the handle is stopped. Dropping the
    /// handle without calling [`PollHandle::stop`] leaves the loop running.
    pub fn subscribe<F>(&self, on_update: F) -> PollHandle
    where
        F: Fn(Vec<MediaItem>) + Send + Sync + 'static,
    {
        if !self.config.is_cloud_active() {
            log::info!("No upload preset configured, serving the local store once");
            let items = match FallbackStore::open(&self.config) {
                Ok(store) => store.load(),
                Err(e) => {
                    log::warn!("Could not open the fallback store: {}", e);
                    Vec::new()
                }
            };
            on_update(items);
            return PollHandle::inert();
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let client = self.client.clone();
        let config = self.config.clone();
        let poll_interval = self.config.poll_interval();

        let task = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                match poll_cycle(&client, &config).await {
                    PollOutcome::Updated(items) => {
                        // A stop during the fetch must not deliver late.
                        if flag.load(Ordering::SeqCst) {
                            break;
                        }
                        on_update(items);
                    }
                    // A rejected status is routine (the listing 404s until
                    // the first tagged upload exists), so it stays at debug.
                    PollOutcome::Skipped(SkipReason::HttpStatus(status)) => {
                        log::debug!("Poll cycle skipped, listing returned {}", status);
                    }
                    PollOutcome::Skipped(reason) => {
                        log::warn!("Poll cycle skipped: {:?}", reason);
                    }
                }
            }
        });

        PollHandle {
            cancelled,
            task: Some(task),
        }
    }

    /// Runs a single fetch cycle outside the interval loop.
    pub async fn poll_now(&self) -> PollOutcome {
        poll_cycle(&self.client, &self.config).await
    }
}

async fn poll_cycle(client: &CloudinaryClient, config: &GalleryConfig) -> PollOutcome {
    let body = match client.list_tagged().await {
        Ok(ListingOutcome::Payload(body)) => body,
        Ok(ListingOutcome::Rejected(status)) => {
            return PollOutcome::Skipped(SkipReason::HttpStatus(status.as_u16()));
        }
        Err(e) => {
            return PollOutcome::Skipped(SkipReason::Transport(e.to_string()));
        }
    };

    match media::parse_listing(config, &body) {
        Ok(items) => PollOutcome::Updated(items),
        Err(e) => PollOutcome::Skipped(SkipReason::MalformedPayload(e.to_string())),
    }
}

/// Cancellation handle returned by [`FeedPoller::subscribe`].
pub struct PollHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    fn inert() -> Self {
        PollHandle {
            cancelled: Arc::new(AtomicBool::new(true)),
            task: None,
        }
    }

    /// True while the poll loop is still scheduled.
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    /// Stops the poll loop. Any fetch still in flight is discarded rather
    /// than delivered. Stopping an already inert handle does nothing.
    pub fn stop(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

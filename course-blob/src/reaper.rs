use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{BlobResult, ChunkedUploadCoordinator};

/// `tokio::time::interval` panics on a zero period.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically evicts abandoned upload sessions
pub struct SessionReaper {
    coordinator: ChunkedUploadCoordinator,
    interval: Duration,
}

impl SessionReaper {
    /// Reaper running at the coordinator's configured sweep interval
    pub fn new(coordinator: ChunkedUploadCoordinator) -> Self {
        let interval = coordinator.rules().sweep_interval;
        Self { coordinator, interval }
    }

    pub fn with_interval(coordinator: ChunkedUploadCoordinator, interval: Duration) -> Self {
        Self { coordinator, interval }
    }

    /// Run until the task is dropped
    pub async fn start(self) {
        let period = self.interval.max(MIN_INTERVAL);
        let mut ticker = interval(period);

        info!("Starting upload session reaper with interval: {:?}", period);

        loop {
            ticker.tick().await;

            match self.reap_expired_sessions().await {
                Ok(evicted) if evicted > 0 => info!("Evicted {} expired upload sessions", evicted),
                Ok(_) => debug!("No expired upload sessions"),
                Err(e) => warn!("Error during upload session sweep: {}", e),
            }
        }
    }

    /// Run one reaper cycle (for testing)
    pub async fn reap_expired_sessions(&self) -> BlobResult<usize> {
        self.coordinator.sweep_expired().await
    }
}

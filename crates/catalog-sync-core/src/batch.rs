use catalog_sync_config::SyncOptions;
use std::time::Duration;
use tracing::trace;

/// Split `items` into ordered chunks of at most `max_batch_size` (0 counts as 1)
pub fn chunk<T>(items: &[T], max_batch_size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(max_batch_size.max(1))
}

/// Delays between remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub between_batches: Duration,
    pub after_clear: Duration,
}

impl Pacing {
    pub fn from_options(options: &SyncOptions) -> Self {
        Self {
            between_batches: options.batch_pause(),
            after_clear: options.clear_pause(),
        }
    }

    /// No delays at all, for tests and dry runs
    pub fn none() -> Self {
        Self {
            between_batches: Duration::ZERO,
            after_clear: Duration::ZERO,
        }
    }

    pub async fn pause_between_batches(&self) {
        pause(self.between_batches).await;
    }

    pub async fn pause_after_clear(&self) {
        pause(self.after_clear).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_options(&SyncOptions::default())
    }
}

async fn pause(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    trace!("Pausing {:?}", duration);
    tokio::time::sleep(duration).await;
}

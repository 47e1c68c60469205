use catalog_sync_sources::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A plan that does not fit the caches it was computed from
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The remote list holds items the local catalog cannot account for
    #[error("remote list is not tracked locally: {0}")]
    UntrackedRemote(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::InvariantViolation(_) => "invariant",
            SyncError::UntrackedRemote(_) => "untracked",
            SyncError::Source(e) => e.category(),
            SyncError::Store(_) => "store",
        }
    }
}

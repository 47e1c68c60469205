use crate::error::SourceError;
use async_trait::async_trait;
use catalog_sync_models::TitleKey;

/// One title to put on the remote list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub key: TitleKey,
    pub external_id: String,
}

/// Move one remote item to a 1-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderMove {
    pub remote_item_id: String,
    pub position: usize,
}

/// Result of an add batch. Remote writes are not atomic, so the adapter
/// reports which items were confirmed even when the batch stops early.
#[derive(Debug, Default)]
pub struct BatchAddOutcome {
    /// key → remote item id, in the order the remote accepted them
    pub confirmed: Vec<(TitleKey, String)>,
    /// Keys the remote explicitly refused while the rest of the batch went through
    pub refused: Vec<TitleKey>,
    /// Set when the batch stopped before every item was attempted
    pub error: Option<SourceError>,
}

impl BatchAddOutcome {
    pub fn failed(error: SourceError) -> Self {
        Self {
            confirmed: Vec::new(),
            refused: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.refused.is_empty()
    }
}

/// Result of a delete batch, itemized like [`BatchAddOutcome`]: only ids in
/// `confirmed` are known to be gone from the remote list.
#[derive(Debug, Default)]
pub struct BatchDeleteOutcome {
    pub confirmed: Vec<String>,
    /// Item ids the remote explicitly kept while the rest of the batch went through
    pub refused: Vec<String>,
    /// Set when the remote's answer says nothing about some items
    pub error: Option<SourceError>,
}

impl BatchDeleteOutcome {
    /// Every item of the batch is gone
    pub fn all(remote_item_ids: &[String]) -> Self {
        Self {
            confirmed: remote_item_ids.to_vec(),
            ..Self::default()
        }
    }

    pub fn failed(error: SourceError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.refused.is_empty()
    }
}

/// External ids of the first and last entries of a remote list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAnchors {
    pub first: String,
    pub last: String,
}

/// A remote watchlist on one platform.
///
/// An adapter owns one session (a browser page or an authenticated HTTP
/// client) and is driven by exactly one sync run at a time, strictly
/// sequentially.
#[async_trait]
pub trait RemoteListAdapter: Send {
    fn platform_name(&self) -> &str;

    /// Platforms without positional ordering return false and never see `reorder`
    fn supports_reorder(&self) -> bool {
        false
    }

    /// Acquire the session. Nothing is sent to the list before this succeeds.
    async fn open_session(&mut self) -> Result<(), SourceError>;

    /// Remove every item from the remote list
    async fn clear(&mut self) -> Result<(), SourceError>;

    /// Add items in order. Never fails as a whole, see [`BatchAddOutcome`].
    async fn add_batch(&mut self, items: &[AddRequest]) -> BatchAddOutcome;

    /// Remove items by remote item id. Never fails as a whole, see [`BatchDeleteOutcome`].
    async fn delete_batch(&mut self, remote_item_ids: &[String]) -> BatchDeleteOutcome;

    async fn reorder(&mut self, moves: &[ReorderMove]) -> Result<(), SourceError>;

    /// `None` when the remote list is empty
    async fn first_and_last_remote_ids(&mut self) -> Result<Option<RemoteAnchors>, SourceError>;

    /// Release the session; safe to call more than once
    async fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

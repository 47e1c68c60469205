pub mod batch;
pub mod dedup;
pub mod enrichment;
pub mod error;
pub mod flows;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use batch::Pacing;
pub use dedup::{Admission, DedupGuard};
pub use enrichment::{CacheRefresh, Enrichment, ListingUpdate, LookupPass};
pub use error::SyncError;
pub use flows::{ListFlow, ListFlows};
pub use reconcile::{plan_reorder, reconcile, SyncPlan};
pub use report::{FailedItem, Operation, SyncReport};
pub use store::{CatalogStore, RemoteCacheSink};
pub use sync::{SyncExecutor, SyncPhase};

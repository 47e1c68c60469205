pub mod catalog;
pub mod ordered_cache;
pub mod ordering;
pub mod record;
pub mod registers;
pub mod title_key;

pub use catalog::CatalogId;
pub use ordered_cache::OrderedCache;
pub use ordering::CanonicalOrder;
pub use record::{CatalogRecord, LookupRecord, RemoteEntry, TmdbMediaType, TmdbRecord};
pub use registers::{DuplicateEntry, DuplicateRegister, UnavailableRegister};
pub use title_key::{clean_title_name, TitleKey};

/// Reconciler's memory of the remote list: key → (remote item id, external id)
pub type RemoteIdCache = OrderedCache<RemoteEntry>;

pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{Config, ImdbConfig, SourceListingConfig, SyncOptions, TmdbConfig};
pub use credentials::CredentialStore;
pub use paths::{CatalogFile, PathManager};

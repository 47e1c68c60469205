pub mod config;
pub mod enrich;
pub mod list;

use catalog_sync_config::{Config, CredentialStore, PathManager};
use catalog_sync_core::{CatalogStore, Enrichment};
use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Everything a command needs, loaded once at startup and passed by reference
pub struct AppContext {
    pub config: Config,
    pub credentials: CredentialStore,
    pub paths: PathManager,
}

impl AppContext {
    pub fn load(paths: PathManager) -> Result<Self> {
        paths
            .ensure_directories()
            .map_err(|e| eyre!("Failed to create {}: {}", paths.config_dir().display(), e))?;

        let config_file = paths.config_file();
        let config = Config::load_or_default(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?
            .with_env_overrides();
        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", config_file.display(), e))?;

        let credentials_file = paths.credentials_file();
        let mut credentials = CredentialStore::new(credentials_file.clone());
        credentials
            .load()
            .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

        tracing::debug!(data_dir = %paths.data_dir().display(), "Context loaded");
        Ok(Self {
            config,
            credentials,
            paths,
        })
    }

    pub fn store(&self) -> CatalogStore {
        CatalogStore::new(&self.paths)
    }

    pub fn enrichment(&self) -> Enrichment {
        Enrichment::new(self.store())
    }
}

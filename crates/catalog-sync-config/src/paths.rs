use anyhow::Result;
use catalog_sync_models::CatalogId;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_DIR: &str = "CATALOG_SYNC_CONFIG_DIR";

/// Files kept per catalog under `data/<catalog>/`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFile {
    /// Raw listing strings as scraped (source catalog only)
    RawListing,
    /// Processed catalog: key list for the source, key→record map otherwise
    Db,
    /// Verified records, the authoritative local cache for list sync
    Cache,
    /// Hand-maintained records merged on top of the cache
    ManualAdditions,
    /// Keys dropped when building the source catalog
    RemoveTitles,
    /// key → "name|year" spelling overrides for lookups
    CorrectNames,
    UnavailableTitles,
    /// Last known remote list state
    RemoteIds,
    Duplicates,
    Mismatched,
}

impl CatalogFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            CatalogFile::RawListing => "raw_listing.json",
            CatalogFile::Db => "db.json",
            CatalogFile::Cache => "cache.json",
            CatalogFile::ManualAdditions => "add_titles.json",
            CatalogFile::RemoveTitles => "remove_titles.json",
            CatalogFile::CorrectNames => "correct_title_names.json",
            CatalogFile::UnavailableTitles => "unavailable_titles.json",
            CatalogFile::RemoteIds => "list_id_cache.json",
            CatalogFile::Duplicates => "duplicate_titles.json",
            CatalogFile::Mismatched => "mismatched_titles.json",
        }
    }
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        if let Ok(base) = std::env::var(ENV_CONFIG_DIR) {
            return Ok(Self::with_base(PathBuf::from(base)));
        }

        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("catalog-sync");

        Ok(Self::with_base(base_dir))
    }

    /// Everything rooted at one directory: config files at the top, data and logs below
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn catalog_dir(&self, catalog: CatalogId) -> PathBuf {
        self.data_dir.join(catalog.as_str())
    }

    pub fn catalog_file(&self, catalog: CatalogId, file: CatalogFile) -> PathBuf {
        self.catalog_dir(catalog).join(file.file_name())
    }

    /// Persistent browser profile, keeps the IMDB login between runs
    pub fn browser_profile_dir(&self) -> PathBuf {
        self.data_dir.join("browser")
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(self.browser_profile_dir())?;
        for catalog in [CatalogId::Source, CatalogId::Imdb, CatalogId::Tmdb] {
            std::fs::create_dir_all(self.catalog_dir(catalog))?;
        }
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_base(PathBuf::from(".catalog-sync")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_files_are_namespaced() {
        let paths = PathManager::with_base(PathBuf::from("/base"));
        assert_eq!(
            paths.catalog_file(CatalogId::Imdb, CatalogFile::RemoteIds),
            PathBuf::from("/base/data/imdb/list_id_cache.json")
        );
        assert_eq!(
            paths.catalog_file(CatalogId::Tmdb, CatalogFile::RemoteIds),
            PathBuf::from("/base/data/tmdb/list_id_cache.json")
        );
        assert_eq!(paths.config_file(), PathBuf::from("/base/config.toml"));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = TempDir::new().unwrap();
        let paths = PathManager::with_base(dir.path().to_path_buf());
        paths.ensure_directories().unwrap();
        assert!(paths.catalog_dir(CatalogId::Source).is_dir());
        assert!(paths.log_dir().is_dir());
        assert!(paths.browser_profile_dir().is_dir());
    }
}

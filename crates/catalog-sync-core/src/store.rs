use anyhow::{Context, Result};
use catalog_sync_config::{CatalogFile, PathManager};
use catalog_sync_models::{CatalogId, RemoteIdCache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a JSON file. A missing file is `Ok(None)`; an unreadable or corrupt
/// file is an error, catalog files are ground truth and never replaced silently.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("{} does not exist", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content).with_context(|| format!("Corrupt JSON in {}", path.display()))?;
    Ok(Some(value))
}

/// Write the full snapshot to a sibling `.tmp` file and rename it into place
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content).with_context(|| format!("Failed to write {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path).with_context(|| format!("Failed to replace {}", path.display()))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Returns whether a file was actually removed
pub fn delete_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))?;
    info!("Deleted {}", path.display());
    Ok(true)
}

/// Catalog files under `data/<catalog>/`
#[derive(Debug, Clone)]
pub struct CatalogStore {
    data_dir: PathBuf,
}

impl CatalogStore {
    pub fn new(paths: &PathManager) -> Self {
        Self::with_data_dir(paths.data_dir().to_path_buf())
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn path(&self, catalog: CatalogId, file: CatalogFile) -> PathBuf {
        self.data_dir.join(catalog.as_str()).join(file.file_name())
    }

    pub fn exists(&self, catalog: CatalogId, file: CatalogFile) -> bool {
        self.path(catalog, file).exists()
    }

    /// Missing files load as the empty value
    pub fn load<T: DeserializeOwned + Default>(&self, catalog: CatalogId, file: CatalogFile) -> Result<T> {
        Ok(read_json(&self.path(catalog, file))?.unwrap_or_default())
    }

    pub fn save<T: Serialize + ?Sized>(&self, catalog: CatalogId, file: CatalogFile, value: &T) -> Result<()> {
        write_json(&self.path(catalog, file), value)
    }

    pub fn delete(&self, catalog: CatalogId, file: CatalogFile) -> Result<bool> {
        delete_file(&self.path(catalog, file))
    }

    pub fn remote_checkpoint(&self, catalog: CatalogId) -> FileCheckpoint {
        FileCheckpoint::new(self.path(catalog, CatalogFile::RemoteIds))
    }
}

/// Where the executor persists the remote id cache after each confirmed batch
pub trait RemoteCacheSink: Send {
    fn checkpoint(&mut self, cache: &RemoteIdCache) -> Result<()>;
}

pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RemoteCacheSink for FileCheckpoint {
    fn checkpoint(&mut self, cache: &RemoteIdCache) -> Result<()> {
        write_json(&self.path, cache)?;
        debug!("Checkpointed {} remote entries", cache.len());
        Ok(())
    }
}

/// Runs that must not touch the persisted remote id cache
#[derive(Debug, Default)]
pub struct Untracked;

impl RemoteCacheSink for Untracked {
    fn checkpoint(&mut self, _cache: &RemoteIdCache) -> Result<()> {
        Ok(())
    }
}

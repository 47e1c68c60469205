use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_IMDB_LIST_ID: &str = "CATALOG_SYNC_IMDB_LIST_ID";
pub const ENV_TMDB_LIST_ID: &str = "CATALOG_SYNC_TMDB_LIST_ID";

/// Process-wide settings, built once at startup and passed by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceListingConfig,
    #[serde(default)]
    pub imdb: ImdbConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub sync: SyncOptions,
}

/// Listing site that feeds the source catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceListingConfig {
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    /// Path of the "latest additions" listing, newest first
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    #[serde(default = "default_page_selector")]
    pub page_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImdbConfig {
    #[serde(default = "default_imdb_list_id")]
    pub list_id: String,
    /// Wait for the first search result on a find page
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Wait for list page elements (anchors, clear loop)
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Browser binary to use instead of the auto-detected Chromium
    #[serde(default)]
    pub browser_executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    #[serde(default = "default_tmdb_list_id")]
    pub list_id: String,
    #[serde(default = "default_tmdb_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Pause between consecutive remote batches
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// Pause after clearing a list before uploading into it
    #[serde(default = "default_clear_pause_ms")]
    pub clear_pause_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_source_base_url() -> String {
    "https://isaidub.love".to_string()
}

fn default_listing_path() -> String {
    "/movie/tamil-dubbed-movies-download".to_string()
}

fn default_title_selector() -> String {
    "body > div > .f > a".to_string()
}

fn default_page_selector() -> String {
    "body .pagination a[title*='Page ']".to_string()
}

fn default_imdb_list_id() -> String {
    "ls4154277024".to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    5000
}

fn default_page_timeout_ms() -> u64 {
    10000
}

fn default_tmdb_list_id() -> String {
    "8301936".to_string()
}

fn default_tmdb_api_base_url() -> String {
    "https://api.themoviedb.org".to_string()
}

fn default_max_batch_size() -> usize {
    100
}

fn default_batch_pause_ms() -> u64 {
    1000
}

fn default_clear_pause_ms() -> u64 {
    5000
}

impl Default for SourceListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            listing_path: default_listing_path(),
            title_selector: default_title_selector(),
            page_selector: default_page_selector(),
        }
    }
}

impl Default for ImdbConfig {
    fn default() -> Self {
        Self {
            list_id: default_imdb_list_id(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            page_timeout_ms: default_page_timeout_ms(),
            headless: default_true(),
            browser_executable: None,
        }
    }
}

impl ImdbConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            list_id: default_tmdb_list_id(),
            api_base_url: default_tmdb_api_base_url(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            clear_pause_ms: default_clear_pause_ms(),
        }
    }
}

impl SyncOptions {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn clear_pause(&self) -> Duration {
        Duration::from_millis(self.clear_pause_ms)
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise start from defaults
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply list id overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list_id) = lookup(ENV_IMDB_LIST_ID).filter(|v| !v.trim().is_empty()) {
            self.imdb.list_id = list_id;
        }
        if let Some(list_id) = lookup(ENV_TMDB_LIST_ID).filter(|v| !v.trim().is_empty()) {
            self.tmdb.list_id = list_id;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sync.max_batch_size == 0 {
            return Err(anyhow::anyhow!("sync.max_batch_size must be at least 1"));
        }
        if self.imdb.list_id.trim().is_empty() {
            return Err(anyhow::anyhow!("imdb.list_id cannot be empty"));
        }
        if !self.imdb.list_id.starts_with("ls") {
            return Err(anyhow::anyhow!("imdb.list_id must look like 'ls0123456789', got '{}'", self.imdb.list_id));
        }
        if self.tmdb.list_id.trim().is_empty() {
            return Err(anyhow::anyhow!("tmdb.list_id cannot be empty"));
        }
        if !self.source.base_url.starts_with("http") {
            return Err(anyhow::anyhow!("source.base_url must be an http(s) URL"));
        }
        Ok(())
    }
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const ENV_TMDB_API_KEY: &str = "CATALOG_SYNC_TMDB_API_KEY";
pub const ENV_TMDB_TOKEN: &str = "CATALOG_SYNC_TMDB_TOKEN";

const TMDB_API_KEY: &str = "tmdb_api_key";
const TMDB_ACCESS_TOKEN: &str = "tmdb_access_token";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Secrets kept apart from `config.toml`. Environment variables win over the file.
pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    /// v3 API key, used for find-by-external-id lookups
    pub fn tmdb_api_key(&self) -> Option<String> {
        env_or(ENV_TMDB_API_KEY, self.get(TMDB_API_KEY))
    }

    pub fn set_tmdb_api_key(&mut self, key: String) {
        self.set(TMDB_API_KEY.to_string(), key);
    }

    /// v4 bearer token, used for list writes
    pub fn tmdb_access_token(&self) -> Option<String> {
        env_or(ENV_TMDB_TOKEN, self.get(TMDB_ACCESS_TOKEN))
    }

    pub fn set_tmdb_access_token(&mut self, token: String) {
        self.set(TMDB_ACCESS_TOKEN.to_string(), token);
    }
}

fn env_or(name: &str, stored: Option<&String>) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| stored.cloned())
}

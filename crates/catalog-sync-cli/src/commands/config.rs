use crate::output::Output;
use crate::ConfigCommands;
use catalog_sync_config::{Config, CredentialStore, PathManager};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run_config(cmd: ConfigCommands, paths: &PathManager, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => show_config(full, paths, output),
        ConfigCommands::Init { force } => init_config(force, paths, output),
        ConfigCommands::Tmdb { api_key, token } => configure_tmdb(api_key, token, paths, output),
    }
}

fn load_credentials(paths: &PathManager) -> Result<CredentialStore> {
    let path = paths.credentials_file();
    let mut credentials = CredentialStore::new(path.clone());
    credentials
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", path.display(), e))?;
    Ok(credentials)
}

fn show_config(full: bool, paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        output.warn(format!("Configuration file not found at {}, showing defaults", config_file.display()));
    }
    let config = Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?
        .with_env_overrides();
    let credentials = load_credentials(paths)?;

    let secret = |value: Option<String>| match value {
        Some(value) if full => value,
        Some(value) => mask_string(&value),
        None => "<not set>".to_string(),
    };
    let api_key = secret(credentials.tmdb_api_key());
    let token = secret(credentials.tmdb_access_token());

    if !output.is_human() {
        output.result(
            true,
            "",
            &json!({
                "config_file": config_file.display().to_string(),
                "data_dir": paths.data_dir().display().to_string(),
                "config": config,
                "credentials": { "tmdb_api_key": api_key, "tmdb_access_token": token },
            }),
        );
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    println!("{} {}", "Config file:".bold(), config_file.display());
    println!("{} {}", "Data directory:".bold(), paths.data_dir().display());
    println!();
    println!("{}", "[source]".cyan());
    println!("  base_url      {}", config.source.base_url);
    println!("  listing_path  {}", config.source.listing_path);
    println!("{}", "[imdb]".cyan());
    println!("  list_id       {}", config.imdb.list_id);
    println!("  headless      {}", config.imdb.headless);
    println!("{}", "[tmdb]".cyan());
    println!("  list_id       {}", config.tmdb.list_id);
    println!("  api_base_url  {}", config.tmdb.api_base_url);
    println!("  api_key       {}", api_key);
    println!("  access_token  {}", token);
    println!("{}", "[sync]".cyan());
    println!("  max_batch_size  {}", config.sync.max_batch_size);
    println!("  batch_pause_ms  {}", config.sync.batch_pause_ms);
    println!("  clear_pause_ms  {}", config.sync.clear_pause_ms);
    Ok(())
}

fn init_config(force: bool, paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        output.warn(format!("{} already exists, use --force to overwrite it", config_file.display()));
        return Ok(());
    }

    Config::default()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to write {}: {}", config_file.display(), e))?;
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create data directories: {}", e))?;
    output.success(format!("Default configuration written to {}", config_file.display()));
    Ok(())
}

fn configure_tmdb(api_key: Option<String>, token: Option<String>, paths: &PathManager, output: &Output) -> Result<()> {
    if api_key.is_none() && token.is_none() {
        output.warn("Nothing to store. Pass --api-key and/or --token");
        return Ok(());
    }

    let mut credentials = load_credentials(paths)?;
    if let Some(api_key) = api_key {
        credentials.set_tmdb_api_key(api_key);
    }
    if let Some(token) = token {
        credentials.set_tmdb_access_token(token);
    }
    credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials to {}: {}", paths.credentials_file().display(), e))?;
    output.success(format!("TMDB credentials saved to {}", paths.credentials_file().display()));
    Ok(())
}

fn mask_string(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string("eyJhbGciOi"), "ey***Oi");
    }
}

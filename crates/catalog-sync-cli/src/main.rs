use catalog_sync_config::PathManager;
use catalog_sync_core::ListFlow;
use catalog_sync_models::CatalogId;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use commands::{config, enrich, list, AppContext};

mod commands;
mod logging;
mod output;
mod ui;

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Keep IMDB and TMDB watchlists in step with a scraped title catalog")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Catalog that owns a remote list
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ListTarget {
    Imdb,
    Tmdb,
}

impl From<ListTarget> for CatalogId {
    fn from(target: ListTarget) -> Self {
        match target {
            ListTarget::Imdb => CatalogId::Imdb,
            ListTarget::Tmdb => CatalogId::Tmdb,
        }
    }
}

/// Requested lists, both when none were named
fn targets(lists: &[ListTarget]) -> Vec<CatalogId> {
    if lists.is_empty() {
        vec![CatalogId::Imdb, CatalogId::Tmdb]
    } else {
        lists.iter().map(|&target| target.into()).collect()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile remote lists against the local catalogs
    #[command(long_about = "Diff each local catalog against its remote id cache and send only the deletes, adds and moves needed. A list the cache does not track yet is caught up from its first and last entries.")]
    Sync {
        /// Lists to sync (default: all)
        #[arg(value_enum)]
        lists: Vec<ListTarget>,
    },
    /// Clear lists and upload every title again
    Upload {
        #[arg(value_enum)]
        lists: Vec<ListTarget>,
    },
    /// Catch up lists the remote id cache is not tracking
    Update {
        #[arg(value_enum)]
        lists: Vec<ListTarget>,
    },
    /// Remove every item from lists and forget their remote ids
    Clear {
        #[arg(value_enum, required = true)]
        lists: Vec<ListTarget>,
    },
    /// Read new titles from the source listing
    Listing,
    /// Look up IMDB records for new source titles
    Lookup,
    /// Look up unresolved IMDB titles again
    Rescrape,
    /// Stop looking up titles whose lookup found nothing
    MarkUnavailable,
    /// Report IMDB records whose name or year disagree with their title
    Mismatched,
    /// Promote verified records into the IMDB and TMDB caches
    RefreshCache,
    /// Resolve TMDB records from IMDB ids
    Tmdb,
    /// Run listing, lookup, tmdb and refresh-cache in order
    Refresh,
    /// Normalize the order of hand-edited catalog files
    Sort,
    /// Show or edit configuration and credentials
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks secrets)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Write a default config.toml
    Init {
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Store TMDB credentials
    Tmdb {
        /// v3 API key used for lookups
        #[arg(long)]
        api_key: Option<String>,

        /// v4 access token used for list writes
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let paths = PathManager::new().map_err(|e| eyre!("{}", e))?;
    logging::init_logging(cli.verbose, cli.quiet, Some(paths.log_dir()))?;
    let output = output::Output::new(cli.output, cli.quiet);

    // config commands must work even when config.toml does not validate
    let command = match cli.command {
        Commands::Config { cmd } => return config::run_config(cmd, &paths, &output),
        command => command,
    };

    let ctx = AppContext::load(paths)?;
    let succeeded = match command {
        Commands::Sync { lists } => list::run_list_flow(&ctx, &targets(&lists), ListFlow::Sync, &output).await?,
        Commands::Upload { lists } => list::run_list_flow(&ctx, &targets(&lists), ListFlow::Upload, &output).await?,
        Commands::Update { lists } => list::run_list_flow(&ctx, &targets(&lists), ListFlow::Update, &output).await?,
        Commands::Clear { lists } => list::run_list_flow(&ctx, &targets(&lists), ListFlow::Clear, &output).await?,
        Commands::Listing => enrich::run_listing(&ctx, &output).await?,
        Commands::Lookup => enrich::run_lookup(&ctx, &output).await?,
        Commands::Rescrape => enrich::run_rescrape(&ctx, &output).await?,
        Commands::MarkUnavailable => enrich::run_register_unavailable(&ctx, &output)?,
        Commands::Mismatched => enrich::run_mismatched(&ctx, &output)?,
        Commands::RefreshCache => enrich::run_refresh_cache(&ctx, &output)?,
        Commands::Tmdb => enrich::run_tmdb(&ctx, &output).await?,
        Commands::Refresh => enrich::run_refresh(&ctx, &output).await?,
        Commands::Sort => enrich::run_sort(&ctx, &output)?,
        Commands::Config { cmd } => {
            config::run_config(cmd, &ctx.paths, &output)?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_lists_means_both() {
        assert_eq!(targets(&[]), vec![CatalogId::Imdb, CatalogId::Tmdb]);
        assert_eq!(targets(&[ListTarget::Tmdb]), vec![CatalogId::Tmdb]);
    }

    #[test]
    fn test_clear_requires_a_list() {
        assert!(Cli::try_parse_from(["catalog-sync", "clear"]).is_err());
        let cli = Cli::try_parse_from(["catalog-sync", "-v", "--output", "json", "sync", "imdb"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Sync { lists } if lists == vec![ListTarget::Imdb]));
    }
}

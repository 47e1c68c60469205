//! Catalog maintenance commands. Each one owns its scraper and closes it
//! whatever the pass returned.

use super::AppContext;
use crate::output::Output;
use crate::ui::Spinner;
use catalog_sync_config::CatalogFile;
use catalog_sync_core::LookupPass;
use catalog_sync_models::CatalogId;
use catalog_sync_sources::{factory, ListingScraper, LookupScraper};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;

async fn close_lookup<S: LookupScraper + ?Sized>(scraper: &mut S) {
    if let Err(e) = scraper.close().await {
        tracing::warn!("Failed to close {}: {}", scraper.scraper_name(), e);
    }
}

pub async fn run_listing(ctx: &AppContext, output: &Output) -> Result<bool> {
    let mut scraper = factory::create_listing_scraper(&ctx.config, &ctx.paths);
    let spinner = Spinner::start(output, "reading the source listing");
    let result = ctx
        .enrichment()
        .update_source_listing(&mut scraper, &ctx.config.source.listing_path)
        .await;
    spinner.finish();
    if let Err(e) = ListingScraper::close(&mut scraper).await {
        tracing::warn!("Failed to close the listing scraper: {}", e);
    }

    let update = result.map_err(|e| eyre!("Listing update failed: {:#}", e))?;
    output.result(
        true,
        format!(
            "{} new titles, {} already known, {} titles in the source catalog",
            update.new_titles, update.skipped, update.catalog_size
        ),
        &update,
    );
    Ok(true)
}

pub async fn run_lookup(ctx: &AppContext, output: &Output) -> Result<bool> {
    let mut scraper = factory::create_imdb_lookup(&ctx.config, &ctx.paths);
    let spinner = Spinner::start(output, "looking up new titles");
    let result = ctx.enrichment().update_lookup_catalog(&mut scraper).await;
    spinner.finish();
    close_lookup(&mut scraper).await;

    report_pass(result, output)
}

pub async fn run_rescrape(ctx: &AppContext, output: &Output) -> Result<bool> {
    let mut scraper = factory::create_imdb_lookup(&ctx.config, &ctx.paths);
    let spinner = Spinner::start(output, "looking up unresolved titles again");
    let result = ctx.enrichment().rescrape_unavailable(&mut scraper).await;
    spinner.finish();
    close_lookup(&mut scraper).await;

    report_pass(result, output)
}

pub async fn run_tmdb(ctx: &AppContext, output: &Output) -> Result<bool> {
    let mut scraper = factory::create_tmdb_lookup(&ctx.config, &ctx.credentials).map_err(|e| eyre!("{}", e))?;
    let spinner = Spinner::start(output, "resolving TMDB records");
    let result = ctx.enrichment().update_tmdb_catalog(&mut scraper).await;
    spinner.finish();
    close_lookup(&mut scraper).await;

    report_pass(result, output)
}

fn report_pass(result: anyhow::Result<LookupPass>, output: &Output) -> Result<bool> {
    let pass = result.map_err(|e| eyre!("Lookup pass failed: {:#}", e))?;
    output.lookup_pass(&pass);
    Ok(pass.is_success())
}

pub fn run_register_unavailable(ctx: &AppContext, output: &Output) -> Result<bool> {
    let registered = ctx
        .enrichment()
        .register_unavailable()
        .map_err(|e| eyre!("Failed to update the unavailable register: {:#}", e))?;
    output.result(
        true,
        format!("{} titles added to the unavailable register", registered),
        &json!({ "registered": registered }),
    );
    Ok(true)
}

pub fn run_mismatched(ctx: &AppContext, output: &Output) -> Result<bool> {
    let mismatched = ctx
        .enrichment()
        .find_mismatched()
        .map_err(|e| eyre!("Mismatch check failed: {:#}", e))?;

    if !output.is_human() {
        output.result(true, "", &json!({ "mismatched": mismatched }));
    } else if mismatched.is_empty() {
        output.success("No mismatched records");
    } else {
        let path = ctx.store().path(CatalogId::Imdb, CatalogFile::Mismatched);
        output.warn(format!("{} mismatched records written to {}", mismatched.len(), path.display()));
        for (key, record) in mismatched.iter() {
            output.info(format!(
                "  {} -> {} ({}) {}",
                key,
                record.display_name.as_deref().unwrap_or("-"),
                record.year.as_deref().unwrap_or("-"),
                record.imdb_id.as_deref().unwrap_or("-")
            ));
        }
    }
    Ok(true)
}

pub fn run_refresh_cache(ctx: &AppContext, output: &Output) -> Result<bool> {
    let enrichment = ctx.enrichment();
    let imdb = enrichment
        .refresh_cache()
        .map_err(|e| eyre!("IMDB cache refresh failed: {:#}", e))?;
    let tmdb = enrichment
        .refresh_tmdb_cache()
        .map_err(|e| eyre!("TMDB cache refresh failed: {:#}", e))?;

    output.result(
        true,
        format!(
            "IMDB cache: {} added, {} removed, {} spelling overrides; TMDB cache: {} added, {} removed",
            imdb.added, imdb.removed, imdb.corrected, tmdb.added, tmdb.removed
        ),
        &json!({ "imdb": imdb, "tmdb": tmdb }),
    );
    Ok(true)
}

pub fn run_sort(ctx: &AppContext, output: &Output) -> Result<bool> {
    ctx.enrichment()
        .sort_catalog_files()
        .map_err(|e| eyre!("Sorting failed: {:#}", e))?;
    output.result(true, "Catalog files sorted", &json!({ "sorted": true }));
    Ok(true)
}

/// Listing, lookups, IMDB cache, TMDB records and TMDB cache, stopping at
/// the first pass that errors
pub async fn run_refresh(ctx: &AppContext, output: &Output) -> Result<bool> {
    let mut all_ok = run_listing(ctx, output).await?;
    all_ok &= run_lookup(ctx, output).await?;
    all_ok &= run_tmdb(ctx, output).await?;
    all_ok &= run_refresh_cache(ctx, output)?;
    Ok(all_ok)
}

//! Catalog maintenance passes: keep the source listing current, resolve new
//! titles into lookup records and promote verified records into the caches
//! the list sync reads.

use crate::dedup::{Admission, DedupGuard};
use crate::store::CatalogStore;
use anyhow::Result;
use catalog_sync_config::CatalogFile;
use catalog_sync_models::{
    CanonicalOrder, CatalogId, CatalogRecord, DuplicateRegister, LookupRecord, OrderedCache, TitleKey, TmdbRecord,
    UnavailableRegister,
};
use catalog_sync_sources::{ListingScraper, LookupScraper, ProgressTracker, SourceError, TitleQuery};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// How often lookup loops log progress; each item is a page load
const LOOKUP_PROGRESS_INTERVAL: usize = 25;

/// Counters of one lookup pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct LookupPass {
    pub pass: &'static str,
    pub pending: usize,
    pub resolved: usize,
    pub from_cache: usize,
    /// Lookups that ran and found nothing, plus registered unavailable titles
    pub unresolved: usize,
    /// Lookups that failed for another reason
    pub failed: usize,
    pub duplicates: usize,
    /// Set when the scraper lost its session and the pass stopped early
    pub aborted: Option<String>,
}

impl LookupPass {
    fn new(pass: &'static str, pending: usize) -> Self {
        Self {
            pass,
            pending,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed == 0
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{}: {} pending, {} resolved, {} from cache, {} unresolved, {} failed, {} duplicates",
            self.pass, self.pending, self.resolved, self.from_cache, self.unresolved, self.failed, self.duplicates
        );
        if let Some(reason) = &self.aborted {
            line.push_str(&format!(" (aborted: {})", reason));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingUpdate {
    pub new_titles: usize,
    /// New listing entries whose key the catalog already holds
    pub skipped: usize,
    pub catalog_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheRefresh {
    pub added: usize,
    pub removed: usize,
    /// Case-only mismatches that got a spelling override
    pub corrected: usize,
}

impl CacheRefresh {
    pub fn is_changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Parse raw listing strings into the source catalog: unparseable and removed
/// titles are dropped, and only the first occurrence of a key is kept.
pub fn rebuild_source_catalog(raw: &[String], remove: &[TitleKey]) -> Vec<TitleKey> {
    let removed: HashSet<&TitleKey> = remove.iter().collect();
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|title| TitleKey::parse(title))
        .filter(|key| !removed.contains(key))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Overlay `cache` on `db`, keep only the keys of `order` (in that order) and
/// append `additions`
pub fn process_catalog<R: Clone>(
    db: &OrderedCache<R>,
    cache: &OrderedCache<R>,
    order: &[TitleKey],
    additions: Option<&OrderedCache<R>>,
) -> OrderedCache<R> {
    let overlaid = db.merge(&cache.select(db.keys()));
    let mut processed = overlaid.select(order);
    if let Some(additions) = additions {
        processed = processed.merge(additions);
    }
    processed
}

/// Name and year a key is expected to resolve to: the spelling override
/// when there is one, the key itself otherwise. A missing year is "".
pub fn expected_title(key: &TitleKey, correct_names: &OrderedCache<String>) -> (String, String) {
    match correct_names.get(key) {
        Some(corrected) => match corrected.split_once('|') {
            Some((name, year)) => (name.to_string(), year.to_string()),
            None => (corrected.clone(), String::new()),
        },
        None => (key.name().to_string(), key.year().unwrap_or_default().to_string()),
    }
}

fn title_query(key: &TitleKey, correct_names: &OrderedCache<String>) -> TitleQuery {
    let (name, year) = expected_title(key, correct_names);
    TitleQuery::new(name, Some(year.as_str()).filter(|y| !y.is_empty()))
}

/// Complete record whose name (ignoring case) and year are the expected ones
fn matches_expected(name: &str, year: &str, record: &LookupRecord) -> bool {
    match (&record.display_name, &record.year, &record.imdb_id) {
        (Some(found_name), Some(found_year), Some(_)) => {
            !name.is_empty()
                && !year.is_empty()
                && name.to_lowercase() == found_name.to_lowercase()
                && year == found_year
        }
        _ => false,
    }
}

/// Records whose resolved name or year disagree with the key. Keys in the
/// unavailable register are never reported.
pub fn mismatched_records(
    db: &OrderedCache<LookupRecord>,
    correct_names: &OrderedCache<String>,
    unavailable: &UnavailableRegister,
) -> OrderedCache<LookupRecord> {
    db.iter()
        .filter(|(key, _)| !unavailable.contains(key))
        .filter(|(key, record)| {
            let (name, year) = expected_title(key, correct_names);
            !matches_expected(&name, &year, record)
        })
        .map(|(key, record)| (key.clone(), record.clone()))
        .collect()
}

/// Everything a lookup loop consults besides the db it fills
struct LookupContext {
    cache: OrderedCache<LookupRecord>,
    unavailable: UnavailableRegister,
    correct_names: OrderedCache<String>,
    guard: DedupGuard,
}

pub struct Enrichment {
    store: CatalogStore,
}

impl Enrichment {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    fn source_keys(&self) -> Result<Vec<TitleKey>> {
        self.store.load(CatalogId::Source, CatalogFile::Db)
    }

    fn canonical_order(&self) -> Result<CanonicalOrder> {
        Ok(CanonicalOrder::new(&self.source_keys()?))
    }

    /// Walk the listing from page 1 until the newest known raw title shows up,
    /// prepend what came before it and rebuild the source catalog.
    pub async fn update_source_listing<S>(&self, scraper: &mut S, url_path: &str) -> Result<ListingUpdate>
    where
        S: ListingScraper + ?Sized,
    {
        let mut raw: Vec<String> = self.store.load(CatalogId::Source, CatalogFile::RawListing)?;
        let latest = raw.first().cloned();
        info!("Checking the listing for titles newer than {:?}", latest);

        let mut fresh = Vec::new();
        let mut found = false;
        let mut page = 1;
        let mut max_page = 1;
        while page <= max_page {
            let listing = scraper.fetch_listing(url_path, page).await?;
            if page == 1 {
                max_page = listing.max_page;
            }
            for title in listing.titles {
                if latest.as_ref() == Some(&title) {
                    found = true;
                    break;
                }
                fresh.push(title);
            }
            if found {
                break;
            }
            page += 1;
        }
        if let (Some(latest), false) = (&latest, found) {
            warn!("{} was not seen in {} listing pages, keeping every title read", latest, max_page);
        }

        let source = self.source_keys()?;
        let additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;
        let known: HashSet<&TitleKey> = source.iter().chain(additions.keys()).collect();
        let mut update = ListingUpdate::default();
        fresh.retain(|title| match TitleKey::parse(title) {
            Some(key) if known.contains(&key) => {
                warn!("Skipping {}: {} is already in the catalog", title, key);
                update.skipped += 1;
                false
            }
            _ => true,
        });

        if fresh.is_empty() {
            info!("No new titles on the listing");
            update.catalog_size = source.len();
            return Ok(update);
        }

        for title in &fresh {
            info!(operation = "listing_new_title", "{}", title);
        }
        update.new_titles = fresh.len();
        fresh.append(&mut raw);
        self.store.save(CatalogId::Source, CatalogFile::RawListing, &fresh)?;
        update.catalog_size = self.rebuild_source_catalog()?.len();
        Ok(update)
    }

    /// Rebuild `source/db.json` from the raw listing and the remove list
    pub fn rebuild_source_catalog(&self) -> Result<Vec<TitleKey>> {
        let raw: Vec<String> = self.store.load(CatalogId::Source, CatalogFile::RawListing)?;
        let remove: Vec<TitleKey> = self.store.load(CatalogId::Source, CatalogFile::RemoveTitles)?;
        let catalog = rebuild_source_catalog(&raw, &remove);
        self.store.save(CatalogId::Source, CatalogFile::Db, &catalog)?;
        info!("Source catalog rebuilt: {} titles from {} listing entries", catalog.len(), raw.len());
        Ok(catalog)
    }

    fn lookup_context(&self, db: &OrderedCache<LookupRecord>) -> Result<LookupContext> {
        let cache: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Cache)?;
        let additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;

        let mut guard = DedupGuard::from_cache(db);
        guard.claim_all(&cache);
        guard.claim_all(&additions);

        Ok(LookupContext {
            cache,
            unavailable: self.store.load(CatalogId::Imdb, CatalogFile::UnavailableTitles)?,
            correct_names: self.store.load(CatalogId::Source, CatalogFile::CorrectNames)?,
            guard,
        })
    }

    /// Resolve source titles the IMDB catalog does not know yet
    pub async fn update_lookup_catalog<S>(&self, scraper: &mut S) -> Result<LookupPass>
    where
        S: LookupScraper<Query = TitleQuery, Record = LookupRecord> + ?Sized,
    {
        let source = self.source_keys()?;
        let mut db: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let known_duplicates: DuplicateRegister = self.store.load(CatalogId::Imdb, CatalogFile::Duplicates)?;

        let pending: Vec<TitleKey> = source
            .iter()
            .filter(|key| !db.contains_key(key) && !known_duplicates.contains_key(key))
            .cloned()
            .collect();
        let mut pass = LookupPass::new("imdb update", pending.len());
        if pending.is_empty() {
            info!("No new titles to look up");
            return Ok(pass);
        }

        let mut context = self.lookup_context(&db)?;
        resolve_titles(scraper, &pending, &mut db, &mut context, &mut pass).await;
        self.finish_lookup_pass(db, context.guard)?;
        info!("{}", pass.summary_line());
        Ok(pass)
    }

    /// Look up again every incomplete record that is neither verified, a
    /// manual addition nor registered as unavailable.
    pub async fn rescrape_unavailable<S>(&self, scraper: &mut S) -> Result<LookupPass>
    where
        S: LookupScraper<Query = TitleQuery, Record = LookupRecord> + ?Sized,
    {
        let mut db: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;
        let context = self.lookup_context(&db)?;

        let pending: Vec<TitleKey> = db
            .iter()
            .filter(|(key, record)| {
                !record.is_complete()
                    && !context.cache.contains_key(key)
                    && !additions.contains_key(key)
                    && !context.unavailable.contains(key)
            })
            .map(|(key, _)| key.clone())
            .collect();
        let mut pass = LookupPass::new("imdb rescrape", pending.len());
        if pending.is_empty() {
            info!("No unresolved titles to look up again");
            return Ok(pass);
        }

        let mut context = context;
        resolve_titles(scraper, &pending, &mut db, &mut context, &mut pass).await;
        self.finish_lookup_pass(db, context.guard)?;
        info!("{}", pass.summary_line());
        Ok(pass)
    }

    /// Move every null IMDB record into the unavailable register so later
    /// passes stop looking it up. Returns how many keys were new.
    pub fn register_unavailable(&self) -> Result<usize> {
        let db: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let mut unavailable: UnavailableRegister = self.store.load(CatalogId::Imdb, CatalogFile::UnavailableTitles)?;

        let mut registered = 0;
        for (key, record) in db.iter() {
            if record.is_unavailable() && unavailable.insert(key.clone()) {
                info!(operation = "unavailable_registered", "{}", key);
                registered += 1;
            }
        }
        if registered > 0 {
            unavailable.sort_by_order(&self.canonical_order()?);
            self.store
                .save(CatalogId::Imdb, CatalogFile::UnavailableTitles, &unavailable)?;
        }
        Ok(registered)
    }

    fn finish_lookup_pass(&self, db: OrderedCache<LookupRecord>, guard: DedupGuard) -> Result<()> {
        self.store.save(CatalogId::Imdb, CatalogFile::Db, &db)?;
        let diverted = guard.into_diverted();
        if !diverted.is_empty() {
            let existing: DuplicateRegister = self.store.load(CatalogId::Imdb, CatalogFile::Duplicates)?;
            self.store
                .save(CatalogId::Imdb, CatalogFile::Duplicates, &existing.merge(&diverted))?;
            warn!("{} looked-up titles duplicate existing ones, see the duplicates register", diverted.len());
        }
        self.process_lookup_catalog()?;
        Ok(())
    }

    /// Rewrite the IMDB db: verified records win, source order, manual additions last
    pub fn process_lookup_catalog(&self) -> Result<usize> {
        let db: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let cache: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Cache)?;
        let additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;

        let processed = process_catalog(&db, &cache, &self.source_keys()?, Some(&additions));
        self.store.save(CatalogId::Imdb, CatalogFile::Db, &processed)?;
        debug!("IMDB db processed: {} records", processed.len());
        Ok(processed.len())
    }

    /// Write the mismatch register, or delete it when everything matches
    pub fn find_mismatched(&self) -> Result<OrderedCache<LookupRecord>> {
        let db: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let correct_names: OrderedCache<String> = self.store.load(CatalogId::Source, CatalogFile::CorrectNames)?;
        let unavailable: UnavailableRegister = self.store.load(CatalogId::Imdb, CatalogFile::UnavailableTitles)?;

        let mismatched = mismatched_records(&db, &correct_names, &unavailable);
        if mismatched.is_empty() {
            self.store.delete(CatalogId::Imdb, CatalogFile::Mismatched)?;
            info!("No mismatched IMDB records");
        } else {
            self.store.save(CatalogId::Imdb, CatalogFile::Mismatched, &mismatched)?;
            warn!("{} IMDB records do not match their titles", mismatched.len());
        }
        Ok(mismatched)
    }

    /// Promote matching IMDB records into the verified cache and drop cache
    /// keys the source catalog no longer lists.
    pub fn refresh_cache(&self) -> Result<CacheRefresh> {
        self.process_lookup_catalog()?;
        let mismatched = self.find_mismatched()?;

        let source = self.source_keys()?;
        let order = CanonicalOrder::new(&source);
        let db: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let mut cache: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Cache)?;
        let additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;
        let unavailable: UnavailableRegister = self.store.load(CatalogId::Imdb, CatalogFile::UnavailableTitles)?;
        let mut correct_names: OrderedCache<String> = self.store.load(CatalogId::Source, CatalogFile::CorrectNames)?;

        let mut refresh = CacheRefresh::default();
        for (key, record) in db.iter() {
            if cache.contains_key(key)
                || additions.contains_key(key)
                || unavailable.contains(key)
                || mismatched.contains_key(key)
            {
                continue;
            }
            let (name, year) = expected_title(key, &correct_names);
            let (Some(found_name), Some(found_year)) = (&record.display_name, &record.year) else {
                continue;
            };
            if found_name != &name {
                correct_names.insert(key.clone(), format!("{}|{}", found_name, found_year));
                refresh.corrected += 1;
            }
            if found_year == &year {
                cache.insert(key.clone(), record.clone());
                refresh.added += 1;
                info!(operation = "cache_add", "add: {}", key);
            }
        }

        let listed: HashSet<&TitleKey> = source.iter().collect();
        cache.retain(|key, _| {
            let keep = listed.contains(key);
            if !keep {
                info!(operation = "cache_remove", "remove: {}", key);
                refresh.removed += 1;
            }
            keep
        });

        if refresh.is_changed() {
            cache.sort_by_order(&order);
            correct_names.sort_by_order(&order);
            self.store.save(CatalogId::Imdb, CatalogFile::Cache, &cache)?;
            self.store.save(CatalogId::Source, CatalogFile::CorrectNames, &correct_names)?;
            info!("IMDB cache updated: {} added, {} removed", refresh.added, refresh.removed);
        } else {
            info!("No new data for the IMDB cache");
        }
        Ok(refresh)
    }

    /// Resolve TMDB records for IMDB entries whose id changed or is new
    pub async fn update_tmdb_catalog<S>(&self, scraper: &mut S) -> Result<LookupPass>
    where
        S: LookupScraper<Query = String, Record = TmdbRecord> + ?Sized,
    {
        let imdb: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let mut tmdb: OrderedCache<TmdbRecord> = self.store.load(CatalogId::Tmdb, CatalogFile::Db)?;

        let pending: Vec<(TitleKey, Option<String>)> = imdb
            .iter()
            .filter(|(key, record)| match tmdb.get(key) {
                Some(known) => known.imdb_id != record.imdb_id,
                None => true,
            })
            .map(|(key, record)| (key.clone(), record.imdb_id.clone()))
            .collect();
        let mut pass = LookupPass::new("tmdb update", pending.len());

        let mut progress = ProgressTracker::new("tmdb update", pending.len(), LOOKUP_PROGRESS_INTERVAL);
        for (index, (key, imdb_id)) in pending.iter().enumerate() {
            let Some(imdb_id) = imdb_id else {
                debug!("{} has no IMDB id", key);
                tmdb.insert(key.clone(), TmdbRecord::unresolved(None));
                pass.unresolved += 1;
                progress.record_skipped();
                continue;
            };
            match scraper.fetch_lookup(imdb_id).await {
                Ok(record) => {
                    debug!("{} resolved to {:?}", key, record.external_id());
                    tmdb.insert(key.clone(), record);
                    pass.resolved += 1;
                    progress.record_done();
                }
                Err(SourceError::LookupUnavailable(_)) => {
                    warn!("{} ({}) is not on TMDB", key, imdb_id);
                    tmdb.insert(key.clone(), TmdbRecord::unresolved(Some(imdb_id.clone())));
                    pass.unresolved += 1;
                    progress.record_failed("unavailable");
                }
                Err(e) if e.is_fatal() => {
                    error!("TMDB lookups stopped at {}: {}", key, e);
                    pass.aborted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    // left untouched so the next update retries it
                    warn!("TMDB lookup for {} failed: {}", key, e);
                    pass.failed += 1;
                    progress.record_failed(e.category());
                }
            }
            progress.log_progress(index + 1);
        }
        progress.log_summary();

        self.store.save(CatalogId::Tmdb, CatalogFile::Db, &tmdb)?;
        let processed = self.process_tmdb_catalog()?;

        let unavailable: UnavailableRegister = processed
            .iter()
            .filter(|(_, record)| !record.is_complete())
            .map(|(key, _)| key.clone())
            .collect();
        if unavailable.is_empty() {
            self.store.delete(CatalogId::Tmdb, CatalogFile::UnavailableTitles)?;
        } else {
            self.store
                .save(CatalogId::Tmdb, CatalogFile::UnavailableTitles, &unavailable)?;
            warn!("{} titles have no TMDB record", unavailable.len());
        }
        info!("{}", pass.summary_line());
        Ok(pass)
    }

    /// Rewrite the TMDB db: verified records win, IMDB db order
    pub fn process_tmdb_catalog(&self) -> Result<OrderedCache<TmdbRecord>> {
        let imdb: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Db)?;
        let tmdb: OrderedCache<TmdbRecord> = self.store.load(CatalogId::Tmdb, CatalogFile::Db)?;
        let cache: OrderedCache<TmdbRecord> = self.store.load(CatalogId::Tmdb, CatalogFile::Cache)?;

        let order: Vec<TitleKey> = imdb.keys().cloned().collect();
        let processed = process_catalog(&tmdb, &cache, &order, None);
        self.store.save(CatalogId::Tmdb, CatalogFile::Db, &processed)?;
        debug!("TMDB db processed: {} records", processed.len());
        Ok(processed)
    }

    /// Mirror the IMDB side's verification into the TMDB cache
    pub fn refresh_tmdb_cache(&self) -> Result<CacheRefresh> {
        let tmdb = self.process_tmdb_catalog()?;
        let imdb_cache: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Cache)?;
        let additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;
        let unavailable: UnavailableRegister = self.store.load(CatalogId::Imdb, CatalogFile::UnavailableTitles)?;
        let mut cache: OrderedCache<TmdbRecord> = self.store.load(CatalogId::Tmdb, CatalogFile::Cache)?;

        let verified =
            |key: &TitleKey| imdb_cache.contains_key(key) || additions.contains_key(key) || unavailable.contains(key);

        let mut refresh = CacheRefresh::default();
        for (key, record) in tmdb.iter() {
            if !cache.contains_key(key) && verified(key) {
                cache.insert(key.clone(), record.clone());
                refresh.added += 1;
                info!(operation = "cache_add", "add: {}", key);
            }
        }
        cache.retain(|key, _| {
            let keep = verified(key);
            if !keep {
                info!(operation = "cache_remove", "remove: {}", key);
                refresh.removed += 1;
            }
            keep
        });

        if refresh.is_changed() {
            cache.sort_by_order(&self.canonical_order()?);
            self.store.save(CatalogId::Tmdb, CatalogFile::Cache, &cache)?;
            info!("TMDB cache updated: {} added, {} removed", refresh.added, refresh.removed);
        } else {
            info!("No new data for the TMDB cache");
        }
        Ok(refresh)
    }

    /// Normalize the hand-edited files: canonical order for the keyed caches,
    /// alphabetical order for the remove list and manual additions.
    pub fn sort_catalog_files(&self) -> Result<()> {
        let order = self.canonical_order()?;

        let mut correct_names: OrderedCache<String> = self.store.load(CatalogId::Source, CatalogFile::CorrectNames)?;
        correct_names.sort_by_order(&order);
        self.store.save(CatalogId::Source, CatalogFile::CorrectNames, &correct_names)?;

        let mut remove: Vec<TitleKey> = self.store.load(CatalogId::Source, CatalogFile::RemoveTitles)?;
        remove.sort();
        self.store.save(CatalogId::Source, CatalogFile::RemoveTitles, &remove)?;

        let mut additions: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::ManualAdditions)?;
        additions.sort_by(|a, b| a.cmp(b));
        self.store.save(CatalogId::Imdb, CatalogFile::ManualAdditions, &additions)?;

        let mut cache: OrderedCache<LookupRecord> = self.store.load(CatalogId::Imdb, CatalogFile::Cache)?;
        cache.sort_by_order(&order);
        self.store.save(CatalogId::Imdb, CatalogFile::Cache, &cache)?;

        let mut unavailable: UnavailableRegister = self.store.load(CatalogId::Imdb, CatalogFile::UnavailableTitles)?;
        unavailable.sort_by_order(&order);
        self.store.save(CatalogId::Imdb, CatalogFile::UnavailableTitles, &unavailable)?;

        info!("Catalog files sorted");
        Ok(())
    }
}

/// Fill `db` for `keys`: verified cache first, registered unavailable titles
/// as null records, a lookup otherwise. A lost scraper session stops the
/// loop and leaves what was resolved so far in `db`.
async fn resolve_titles<S>(
    scraper: &mut S,
    keys: &[TitleKey],
    db: &mut OrderedCache<LookupRecord>,
    context: &mut LookupContext,
    pass: &mut LookupPass,
) where
    S: LookupScraper<Query = TitleQuery, Record = LookupRecord> + ?Sized,
{
    let mut progress = ProgressTracker::new(pass.pass, keys.len(), LOOKUP_PROGRESS_INTERVAL);

    for (index, key) in keys.iter().enumerate() {
        if let Some(record) = context.cache.get(key) {
            db.insert(key.clone(), record.clone());
            pass.from_cache += 1;
            progress.record_skipped();
            continue;
        }
        if context.unavailable.contains(key) {
            db.insert(key.clone(), LookupRecord::unavailable());
            pass.unresolved += 1;
            progress.record_skipped();
            continue;
        }

        let query = title_query(key, &context.correct_names);
        match scraper.fetch_lookup(&query).await {
            Ok(record) => {
                if let Some(imdb_id) = record.imdb_id.as_deref() {
                    if let Admission::Duplicate(_) = context.guard.admit(key, imdb_id) {
                        pass.duplicates += 1;
                        progress.record_diverted();
                        progress.log_progress(index + 1);
                        continue;
                    }
                }
                debug!("{} resolved to {:?}", key, record);
                db.insert(key.clone(), record);
                pass.resolved += 1;
                progress.record_done();
            }
            Err(e) if e.is_fatal() => {
                error!("{} lookups stopped at {}: {}", scraper.scraper_name(), key, e);
                pass.aborted = Some(e.to_string());
                break;
            }
            Err(e) => {
                debug!("Lookup for {} failed: {}", key, e);
                db.insert(key.clone(), LookupRecord::unavailable());
                if matches!(e, SourceError::LookupUnavailable(_)) {
                    pass.unresolved += 1;
                } else {
                    pass.failed += 1;
                }
                progress.record_failed(e.category());
            }
        }
        progress.log_progress(index + 1);
    }
    progress.log_summary();
}

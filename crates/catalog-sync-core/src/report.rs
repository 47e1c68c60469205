use catalog_sync_models::{CatalogId, TitleKey};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Delete,
    Add,
    Reorder,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Delete => "delete",
            Operation::Add => "add",
            Operation::Reorder => "reorder",
        };
        f.write_str(name)
    }
}

/// One title a remote call did not go through for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem {
    pub key: TitleKey,
    pub operation: Operation,
    /// Error category, see `SourceError::category`
    pub category: &'static str,
    pub message: String,
}

/// Outcome of one list run. Never an error itself: a run that could not
/// start or had to stop carries the reason in `fatal`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub catalog: CatalogId,
    pub added: usize,
    pub removed: usize,
    pub reordered: usize,
    pub failed: Vec<FailedItem>,
    pub duplicates: usize,
    pub unresolved: usize,
    pub fatal: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl SyncReport {
    pub fn new(catalog: CatalogId) -> Self {
        Self {
            catalog,
            added: 0,
            removed: 0,
            reordered: 0,
            failed: Vec::new(),
            duplicates: 0,
            unresolved: 0,
            fatal: None,
            duration: Duration::ZERO,
        }
    }

    /// A report for a run that stopped before anything was sent
    pub fn aborted(catalog: CatalogId, reason: impl Into<String>) -> Self {
        let mut report = Self::new(catalog);
        report.fatal = Some(reason.into());
        report
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.fatal.is_none()
    }

    /// Failed items per error category
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.failed {
            *counts.entry(item.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{}: {} added, {} removed, {} reordered, {} failed, {} duplicates, {} unresolved in {:.1}s",
            self.catalog,
            self.added,
            self.removed,
            self.reordered,
            self.failed.len(),
            self.duplicates,
            self.unresolved,
            self.duration.as_secs_f64()
        );
        let counts = self.failure_counts();
        if !counts.is_empty() {
            let parts: Vec<String> = counts.iter().map(|(category, n)| format!("{}={}", category, n)).collect();
            line.push_str(&format!(" [{}]", parts.join(", ")));
        }
        if let Some(reason) = &self.fatal {
            line.push_str(&format!(" (aborted: {})", reason));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(key: &str, category: &'static str) -> FailedItem {
        FailedItem {
            key: TitleKey::from(key),
            operation: Operation::Add,
            category,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_success_requires_no_failures_and_no_fatal() {
        let mut report = SyncReport::new(CatalogId::Imdb);
        assert!(report.is_success());

        report.failed.push(failed("A|", "transient"));
        assert!(!report.is_success());

        let aborted = SyncReport::aborted(CatalogId::Tmdb, "no token");
        assert!(!aborted.is_success());
        assert!(aborted.summary_line().ends_with("(aborted: no token)"));
    }

    #[test]
    fn test_summary_groups_failures_by_category() {
        let mut report = SyncReport::new(CatalogId::Imdb);
        report.added = 3;
        report.failed.push(failed("A|", "transient"));
        report.failed.push(failed("B|", "transient"));
        report.failed.push(failed("C|", "rejected"));

        assert_eq!(report.failure_counts().get("transient"), Some(&2));
        let line = report.summary_line();
        assert!(line.starts_with("imdb: 3 added"));
        assert!(line.contains("[rejected=1, transient=2]"));
    }

    #[test]
    fn test_json_shape() {
        let mut report = SyncReport::new(CatalogId::Tmdb);
        report.duration = Duration::from_millis(1500);
        report.failed.push(failed("A|", "rejected"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["catalog"], "tmdb");
        assert_eq!(json["duration_ms"], 1500);
        assert_eq!(json["failed"][0]["operation"], "add");
        assert_eq!(json["failed"][0]["key"], "A|");
        assert!(json["fatal"].is_null());
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between name and year inside a key
pub const KEY_SEPARATOR: char = '|';

/// Substrings marking multi-title releases that never map to a single title
const EXCLUDED_MARKERS: [&str; 5] = ["collection", "duology", "trilogy", "pentalogy", "quadrilogy"];

static DISPLAY_YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.+) \((\d{4})\)").expect("display year regex should compile")
});
static ANNOTATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(.*\)|\[.*\]").expect("annotation regex should compile")
});
static SEASON_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Season\s\d+").expect("season regex should compile")
});
static PART_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)part\s(\d+)").expect("part regex should compile")
});
static TRAILING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-\s]+$").expect("trailing regex should compile")
});
static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("whitespace regex should compile")
});

/// Canonical `name|year` identity of a title.
///
/// A key joins the source catalog with both lookup catalogs and the remote id
/// caches. Equality and hashing are exact; [`TitleKey::matches`] is the
/// case-insensitive comparison used when matching scraped names against keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleKey(String);

impl TitleKey {
    /// Build a key from already-clean parts. A missing year yields `name|`.
    pub fn new(name: &str, year: Option<&str>) -> Self {
        Self(format!("{}{}{}", name, KEY_SEPARATOR, year.unwrap_or_default()))
    }

    /// Parse a free-form listing string such as `"Pulp Fiction (1994)"`.
    ///
    /// Returns `None` for collection-style releases and for strings that
    /// clean down to nothing. Already-normalized keys (`"Name|1994"`) parse to
    /// themselves.
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, year) = if let Some((name, year)) = raw.split_once(KEY_SEPARATOR) {
            (name, year)
        } else if let Some(caps) = DISPLAY_YEAR_PATTERN.captures(raw) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let year = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            (name, year)
        } else {
            (raw, "")
        };

        let name = clean_title_name(name)?;
        Some(Self(format!("{}{}{}", name, KEY_SEPARATOR, year)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.split_once(KEY_SEPARATOR).map(|(name, _)| name).unwrap_or(&self.0)
    }

    pub fn year(&self) -> Option<&str> {
        self.0
            .split_once(KEY_SEPARATOR)
            .map(|(_, year)| year)
            .filter(|year| !year.is_empty())
    }

    /// Case-insensitive comparison of both parts
    pub fn matches(&self, other: &TitleKey) -> bool {
        self.name().to_lowercase() == other.name().to_lowercase() && self.year() == other.year()
    }
}

impl fmt::Display for TitleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TitleKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TitleKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Apply the listing cleanup rules to a bare title name.
///
/// Returns `None` when the name is a multi-title release.
pub fn clean_title_name(name: &str) -> Option<String> {
    let lowered = name.to_lowercase();
    if EXCLUDED_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return None;
    }

    let name = ANNOTATION_PATTERN.replace_all(name, "");
    let name = SEASON_PATTERN.replace_all(&name, "");
    let name = PART_PATTERN.replace_all(&name, "$1");
    let name = TRAILING_PATTERN.replace(&name, "");
    let name = WHITESPACE_PATTERN.replace_all(&name, " ");

    if name.trim().is_empty() {
        None
    } else {
        Some(name.into_owned())
    }
}

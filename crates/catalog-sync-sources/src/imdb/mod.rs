pub mod list;
pub mod lookup;

pub use list::ImdbListAdapter;
pub use lookup::ImdbLookupScraper;

use once_cell::sync::Lazy;
use regex::Regex;

pub const IMDB_BASE_URL: &str = "https://www.imdb.com";

pub mod selectors {
    /// First title link in the "Titles" section of a find page
    pub const FIND_TITLE_LINK: &str =
        "section[data-testid='find-results-section-title'] div.ipc-title--title > a[href*='/title/tt']";
    pub const FIND_TITLE_YEAR: &str =
        "section[data-testid='find-results-section-title'] div.cli-title-metadata > span:first-child";

    /// Hidden input on the list edit page carrying the form token
    pub const LIST_FORM_TOKEN: &str = "#main > input";
    pub const LIST_FIRST_TITLE_LINK: &str =
        "section.ipc-page-section div.ipc-title--title > a[href*='/title/tt']";
    pub const LIST_SELECT_ALL: &str = "input#list-edit-select-all-items";
    pub const LIST_DELETE_BUTTON: &str = "button[data-testid='list-edit-delete-items']";
    pub const LIST_CONFIRM_DELETE: &str = "button[data-testid='dlp-delete-btn']";
}

static TITLE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/title/(tt\d+)/?").expect("title id regex should compile")
});
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})").expect("year regex should compile")
});

/// `tt` id from a title link such as `/title/tt0110912/?ref_=fn_al_tt_1`
pub fn title_id_from_href(href: &str) -> Option<String> {
    TITLE_ID_PATTERN
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Leading four-digit year of a metadata string like `1994–2001`
pub fn year_from_text(text: &str) -> Option<String> {
    YEAR_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn find_url(name: &str, year: Option<&str>) -> String {
    let mut query = urlencoding::encode(name).into_owned();
    if let Some(year) = year {
        query.push_str(&urlencoding::encode(&format!(" {}", year)));
    }
    format!("{}/find/?s=tt&q={}", IMDB_BASE_URL, query)
}

pub fn list_edit_url(list_id: &str) -> String {
    format!("{}/list/{}/edit", IMDB_BASE_URL, list_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_id_from_href() {
        assert_eq!(title_id_from_href("/title/tt0110912/?ref_=fn_al_tt_1"), Some("tt0110912".to_string()));
        assert_eq!(title_id_from_href("/name/nm0000233/"), None);
    }

    #[test]
    fn test_year_from_text() {
        assert_eq!(year_from_text("2008–2013"), Some("2008".to_string()));
        assert_eq!(year_from_text("TV Series"), None);
    }

    #[test]
    fn test_find_url_encodes_name_and_year() {
        assert_eq!(
            find_url("Kill Bill 2", Some("2004")),
            "https://www.imdb.com/find/?s=tt&q=Kill%20Bill%202%202004"
        );
        assert_eq!(find_url("Dune", None), "https://www.imdb.com/find/?s=tt&q=Dune");
    }
}

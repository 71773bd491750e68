//! Cache key construction.
//!
//! Keys are grouped by family prefix so a revalidated site path can be mapped
//! onto the entries it should drop.

use crate::application::repos::{LibraryQueryFilter, PageRange};
use crate::domain::types::SortBy;

pub const LIBRARIES_PREFIX: &str = "libraries-";
pub const FRAMEWORKS_PREFIX: &str = "frameworks-";
pub const NPM_STATS_PREFIX: &str = "npm-stats-";
pub const NPM_DETAILS_PREFIX: &str = "npm-details-";

pub fn library_list(sort: SortBy, filter: &LibraryQueryFilter, range: PageRange) -> String {
    let mut key = format!(
        "{LIBRARIES_PREFIX}list-{}-{}:{}",
        sort.as_str(),
        range.start,
        range.end
    );
    if let Some(min) = filter.min_components {
        key.push_str(&format!("-c{min}"));
    }
    if let Some(min) = filter.min_downloads {
        key.push_str(&format!("-d{min}"));
    }
    if let Some(days) = filter.updated_within_days {
        key.push_str(&format!("-u{days}"));
    }
    // Free-text values are length-prefixed so no value can spill into the next field.
    if let Some(framework) = filter.framework.as_deref() {
        key.push_str(&format!("-f{}:{framework}", framework.len()));
    }
    if let Some(search) = filter.search.as_deref() {
        let search = search.to_lowercase();
        key.push_str(&format!("-q{}:{search}", search.len()));
    }
    key
}

pub fn library_detail(slug: &str) -> String {
    format!("{LIBRARIES_PREFIX}detail-{slug}")
}

pub fn framework_list(sort: SortBy, range: PageRange) -> String {
    format!(
        "{FRAMEWORKS_PREFIX}list-{}-{}:{}",
        sort.as_str(),
        range.start,
        range.end
    )
}

pub fn framework_detail(slug: &str) -> String {
    format!("{FRAMEWORKS_PREFIX}detail-{slug}")
}

pub fn npm_stats(package: &str, window_days: u32) -> String {
    format!("{NPM_STATS_PREFIX}{package}-{window_days}")
}

pub fn npm_details(package: &str) -> String {
    format!("{NPM_DETAILS_PREFIX}{package}")
}

/// Local cache entries affected by purging one site path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    All,
    Prefix(String),
}

/// Map a normalized site path (`/libraries/shadcn`) onto cache prefixes.
pub fn scopes_for_path(path: &str) -> Vec<InvalidationScope> {
    let trimmed = path.trim_end_matches('*').trim_end_matches('/');
    let mut segments = trimmed.trim_start_matches('/').splitn(2, '/');
    let section = segments.next().unwrap_or_default();
    let slug = segments.next().filter(|rest| !rest.is_empty());

    match (section, slug) {
        ("", _) => vec![InvalidationScope::All],
        ("libraries" | "library", None) => {
            vec![InvalidationScope::Prefix(LIBRARIES_PREFIX.to_string())]
        }
        ("libraries" | "library", Some(slug)) => vec![
            InvalidationScope::Prefix(library_detail(slug)),
            InvalidationScope::Prefix(format!("{LIBRARIES_PREFIX}list-")),
            InvalidationScope::Prefix(format!("{FRAMEWORKS_PREFIX}detail-")),
        ],
        ("frameworks" | "framework", None) => vec![
            InvalidationScope::Prefix(FRAMEWORKS_PREFIX.to_string()),
            InvalidationScope::Prefix(format!("{LIBRARIES_PREFIX}list-")),
        ],
        ("frameworks" | "framework", Some(slug)) => vec![
            InvalidationScope::Prefix(framework_detail(slug)),
            InvalidationScope::Prefix(format!("{FRAMEWORKS_PREFIX}list-")),
        ],
        _ => Vec::new(),
    }
}

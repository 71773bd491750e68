//! Headless filter, sort and pagination state for directory listings.
//!
//! A [`ControlStore`] owns one state record, mirrors it into a key-value
//! [`StateStorage`] as JSON and publishes every change on a `watch` channel so
//! list views can re-derive their visible rows from an already-fetched page.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tracing::warn;

use crate::application::repos::{LibraryQueryFilter, PageRange};
use crate::cache::lock::mutex_lock;
use crate::domain::entities::{LibraryRecord, LibrarySummary};
use crate::domain::types::{SortBy, SortDirection};

const SOURCE: &str = "application::controls";

/// Key-value persistence for control state.
pub trait StateStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        mutex_lock(&self.values, SOURCE, "get").get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        mutex_lock(&self.values, SOURCE, "set").insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        mutex_lock(&self.values, SOURCE, "remove").remove(key);
    }
}

/// A state record that can live in a [`ControlStore`].
pub trait ControlState:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Send + Sync + 'static
{
    const STORAGE_KEY: &'static str;
}

pub struct ControlStore<S: ControlState> {
    storage: Arc<dyn StateStorage>,
    sender: watch::Sender<S>,
}

impl<S: ControlState> ControlStore<S> {
    pub fn new(storage: Arc<dyn StateStorage>) -> Self {
        let (sender, _) = watch::channel(S::default());
        Self { storage, sender }
    }

    /// Load the persisted override and broadcast it.
    ///
    /// Missing or unreadable values fall back to the defaults.
    pub fn mount(&self) -> S {
        let state = match self.storage.get(S::STORAGE_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(
                    target = "uidir::controls",
                    key = S::STORAGE_KEY,
                    error = %err,
                    "discarding unreadable persisted state"
                );
                S::default()
            }),
            None => S::default(),
        };
        self.sender.send_replace(state.clone());
        state
    }

    pub fn current(&self) -> S {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }

    /// Mutate the state, write it through to storage and broadcast it.
    pub fn update(&self, mutate: impl FnOnce(&mut S)) -> S {
        self.sender.send_modify(mutate);
        let state = self.current();
        match serde_json::to_string(&state) {
            Ok(raw) => self.storage.set(S::STORAGE_KEY, raw),
            Err(err) => warn!(
                target = "uidir::controls",
                key = S::STORAGE_KEY,
                error = %err,
                "failed to persist state"
            ),
        }
        state
    }

    /// Forget the persisted override and broadcast the defaults.
    pub fn reset(&self) -> S {
        self.storage.remove(S::STORAGE_KEY);
        let state = S::default();
        self.sender.send_replace(state.clone());
        state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingFilter {
    #[default]
    All,
    Free,
    Paid,
    Freemium,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterState {
    pub min_components: Option<u32>,
    pub min_downloads: Option<u64>,
    pub last_updated_days: Option<u32>,
    pub min_stars: Option<u64>,
    pub framework: Option<String>,
    pub pricing: PricingFilter,
    pub search: Option<String>,
    /// Lower-case feature names (`styling`, `typescript`, ...).
    pub tags: Vec<String>,
}

impl ControlState for FilterState {
    const STORAGE_KEY: &'static str = "ui-library-filters";
}

impl FilterState {
    pub fn toggle_tag(&mut self, tag: &str) {
        let tag = tag.trim().to_lowercase();
        if let Some(position) = self.tags.iter().position(|existing| *existing == tag) {
            self.tags.remove(position);
        } else if !tag.is_empty() {
            self.tags.push(tag);
        }
    }

    pub fn matches(&self, summary: &LibrarySummary, now: OffsetDateTime) -> bool {
        let library = &summary.library;

        if let Some(min) = self.min_components {
            let count = library.total_components.unwrap_or(0);
            if i64::from(count) < i64::from(min) {
                return false;
            }
        }
        if let Some(min) = self.min_downloads {
            if !at_least(library.npm_downloads, min) {
                return false;
            }
        }
        if let Some(min) = self.min_stars {
            if !at_least(library.github_stars, min) {
                return false;
            }
        }
        if let Some(days) = self.last_updated_days {
            let cutoff = now - Duration::days(i64::from(days));
            match library.last_update {
                Some(updated) if updated >= cutoff => {}
                _ => return false,
            }
        }
        if let Some(framework) = non_blank(&self.framework) {
            if !summary.supports_framework(framework) {
                return false;
            }
        }
        if !pricing_matches(self.pricing, library.pricing.as_deref()) {
            return false;
        }
        if let Some(search) = non_blank(&self.search) {
            if !search_matches(library, search) {
                return false;
            }
        }
        self.tags.iter().all(|tag| feature_matches(library, tag))
    }

    /// Narrow `page` to the rows this filter accepts.
    pub fn apply<'a>(
        &self,
        page: &'a [LibrarySummary],
        now: OffsetDateTime,
    ) -> Vec<&'a LibrarySummary> {
        page.iter()
            .filter(|summary| self.matches(summary, now))
            .collect()
    }

    /// The subset of this filter the listing endpoint evaluates server-side.
    pub fn to_query(&self) -> LibraryQueryFilter {
        LibraryQueryFilter {
            min_components: self.min_components,
            min_downloads: self.min_downloads,
            updated_within_days: self.last_updated_days,
            framework: non_blank(&self.framework).map(str::to_string),
            search: non_blank(&self.search).map(str::to_string),
        }
    }
}

impl From<&FilterState> for LibraryQueryFilter {
    fn from(state: &FilterState) -> Self {
        state.to_query()
    }
}

fn at_least(value: Option<i64>, min: u64) -> bool {
    let value = value.unwrap_or(0).max(0) as u64;
    value >= min
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn pricing_matches(filter: PricingFilter, pricing: Option<&str>) -> bool {
    let wanted = match filter {
        PricingFilter::All => return true,
        PricingFilter::Free => "free",
        PricingFilter::Paid => "paid",
        PricingFilter::Freemium => "freemium",
    };
    pricing.is_some_and(|value| value.trim().eq_ignore_ascii_case(wanted))
}

fn search_matches(library: &LibraryRecord, search: &str) -> bool {
    let needle = search.to_lowercase();
    [
        Some(library.name.as_str()),
        Some(library.title.as_str()),
        library.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

fn feature_matches(library: &LibraryRecord, tag: &str) -> bool {
    match tag {
        "styling" if library.styling.is_some() => true,
        "customization" if library.customization.is_some() => true,
        _ => [
            library.styling.as_deref(),
            library.customization.as_deref(),
            library.description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(tag)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortBy,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: SortBy::Popular,
            direction: SortDirection::Desc,
        }
    }
}

impl ControlState for SortState {
    const STORAGE_KEY: &'static str = "ui-library-sort";
}

impl SortState {
    /// Selecting the active descending field flips it to ascending; anything
    /// else selects the field descending.
    pub fn select(&mut self, field: SortBy) {
        if self.field == field {
            self.direction = self.direction.flipped();
        } else {
            self.field = field;
            self.direction = SortDirection::Desc;
        }
    }

    /// Order `rows` in place; rows missing the sort value go last either way.
    pub fn apply(&self, rows: &mut [LibrarySummary]) {
        rows.sort_by(|left, right| self.compare(&left.library, &right.library));
    }

    fn compare(&self, left: &LibraryRecord, right: &LibraryRecord) -> Ordering {
        match self.field {
            SortBy::Popular => self.nulls_last(left.github_stars, right.github_stars),
            SortBy::Latest => self.nulls_last(left.last_update, right.last_update),
            SortBy::Components => self.nulls_last(left.total_components, right.total_components),
            SortBy::Downloads => self.nulls_last(left.npm_downloads, right.npm_downloads),
            SortBy::Name => self.directed(left.name.to_lowercase().cmp(&right.name.to_lowercase())),
        }
    }

    fn nulls_last<T: Ord>(&self, left: Option<T>, right: Option<T>) -> Ordering {
        match (left, right) {
            (Some(left), Some(right)) => self.directed(left.cmp(&right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One slot in a pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Gap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginationState {
    pub total_items: u64,
    pub items_per_page: u32,
    pub current_page: u32,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            total_items: 0,
            items_per_page: 20,
            current_page: 1,
        }
    }
}

impl ControlState for PaginationState {
    const STORAGE_KEY: &'static str = "ui-library-pagination";
}

impl PaginationState {
    pub fn total_pages(&self) -> u32 {
        let per_page = u64::from(self.items_per_page.max(1));
        let pages = self.total_items.div_ceil(per_page);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Move to `page` when it exists; returns whether the page changed.
    pub fn go_to(&mut self, page: u32) -> bool {
        if page < 1 || page > self.total_pages() || page == self.current_page {
            return false;
        }
        self.current_page = page;
        true
    }

    /// Replace the item count, keeping the current page in range.
    pub fn set_total(&mut self, total_items: u64) {
        self.total_items = total_items;
        self.current_page = self.current_page.clamp(1, self.total_pages().max(1));
    }

    /// Row range for the listing endpoint.
    pub fn range(&self) -> PageRange {
        let per_page = self.items_per_page.clamp(1, PageRange::MAX_WIDTH);
        let start = self.current_page.saturating_sub(1).saturating_mul(per_page);
        PageRange {
            start,
            end: start.saturating_add(per_page - 1),
        }
    }

    /// First, last, and the pages around the current one, with gaps between.
    /// Empty when everything fits on one page.
    pub fn window(&self) -> Vec<PageItem> {
        let total = self.total_pages();
        if total <= 1 {
            return Vec::new();
        }

        let current = self.current_page.clamp(1, total);
        let start = current.saturating_sub(1).max(2);
        let end = (current + 1).min(total - 1);

        let mut items = vec![PageItem::Page(1)];
        if start > 2 {
            items.push(PageItem::Gap);
        }
        items.extend((start..=end).map(PageItem::Page));
        if end < total - 1 {
            items.push(PageItem::Gap);
        }
        items.push(PageItem::Page(total));
        items
    }
}

//! Read-side facade over the directory repositories.
//!
//! Every repository call runs under the shared [`RetryExecutor`] and its
//! result is held in a short-lived [`TtlCache`] keyed by the request shape.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uidir_api_types::StatsPanel;

use crate::application::repos::{
    FrameworksRepo, LibrariesRepo, LibraryPage, LibraryQueryFilter, PageRange, RepoError,
};
use crate::application::retry::RetryExecutor;
use crate::application::stats::StatsService;
use crate::cache::{CacheConfig, InvalidationScope, TtlCache, keys};
use crate::domain::entities::{FrameworkRecord, LibraryRecord, LibrarySummary};
use crate::domain::types::{SortBy, SortColumn, SortSpec, StatsWindow};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{entity} `{slug}` not found")]
    NotFound { entity: &'static str, slug: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl DirectoryError {
    fn not_found(entity: &'static str, slug: &str) -> Self {
        Self::NotFound {
            entity,
            slug: slug.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryDetail {
    pub library: LibrarySummary,
    pub stats: Option<StatsPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameworkPage {
    pub frameworks: Vec<FrameworkRecord>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameworkDetail {
    pub framework: FrameworkRecord,
    pub libraries: Vec<LibraryRecord>,
    pub stats: Option<StatsPanel>,
}

type FrameworkWithLibraries = (FrameworkRecord, Vec<LibraryRecord>);

pub struct DirectoryService {
    libraries: Arc<dyn LibrariesRepo>,
    frameworks: Arc<dyn FrameworksRepo>,
    stats: Arc<StatsService>,
    retry: Arc<RetryExecutor>,
    list_ttl: Duration,
    library_pages: TtlCache<LibraryPage>,
    library_details: TtlCache<Option<LibrarySummary>>,
    framework_pages: TtlCache<FrameworkPage>,
    framework_details: TtlCache<Option<FrameworkWithLibraries>>,
}

impl DirectoryService {
    pub fn new(
        libraries: Arc<dyn LibrariesRepo>,
        frameworks: Arc<dyn FrameworksRepo>,
        stats: Arc<StatsService>,
        retry: Arc<RetryExecutor>,
        cache: &CacheConfig,
    ) -> Self {
        let list_ttl = cache.effective_list_ttl();
        Self {
            libraries,
            frameworks,
            stats,
            retry,
            list_ttl,
            library_pages: TtlCache::new("library_pages", list_ttl, cache),
            library_details: TtlCache::new("library_details", list_ttl, cache),
            framework_pages: TtlCache::new("framework_pages", list_ttl, cache),
            framework_details: TtlCache::new("framework_details", list_ttl, cache),
        }
    }

    pub fn stats(&self) -> &Arc<StatsService> {
        &self.stats
    }

    pub async fn list_libraries(
        &self,
        sort: SortBy,
        filter: &LibraryQueryFilter,
        range: PageRange,
    ) -> Result<LibraryPage, DirectoryError> {
        let key = keys::library_list(sort, filter, range);
        let spec = SortSpec::from(sort);
        let page = self
            .library_pages
            .get_or_fetch_with_ttl(&key, self.list_ttl, move || async move {
                self.retry
                    .execute("list_libraries", || {
                        self.libraries.list_libraries(spec, filter, range)
                    })
                    .await
            })
            .await?;
        Ok(page)
    }

    pub async fn library_detail(
        &self,
        slug: &str,
        window: StatsWindow,
    ) -> Result<LibraryDetail, DirectoryError> {
        let key = keys::library_detail(slug);
        let library = self
            .library_details
            .get_or_fetch_with_ttl(&key, self.list_ttl, move || async move {
                self.retry
                    .execute("find_library_by_slug", || {
                        self.libraries.find_library_by_slug(slug)
                    })
                    .await
            })
            .await?
            .ok_or_else(|| DirectoryError::not_found("library", slug))?;

        let stats = self
            .stats
            .panel_for(library.library.npm_package_name.as_deref(), window)
            .await;
        Ok(LibraryDetail { library, stats })
    }

    pub async fn list_frameworks(
        &self,
        sort: SortBy,
        range: PageRange,
    ) -> Result<FrameworkPage, DirectoryError> {
        let key = keys::framework_list(framework_sort(sort), range);
        let spec = SortSpec::from(framework_sort(sort));
        let page = self
            .framework_pages
            .get_or_fetch_with_ttl(&key, self.list_ttl, move || async move {
                let (frameworks, total) = self
                    .retry
                    .execute("list_frameworks", || {
                        self.frameworks.list_frameworks(spec, range)
                    })
                    .await?;
                Ok::<_, RepoError>(FrameworkPage { frameworks, total })
            })
            .await?;
        Ok(page)
    }

    pub async fn framework_detail(
        &self,
        slug: &str,
        window: StatsWindow,
    ) -> Result<FrameworkDetail, DirectoryError> {
        let key = keys::framework_detail(slug);
        let (framework, libraries) = self
            .framework_details
            .get_or_fetch_with_ttl(&key, self.list_ttl, move || async move {
                let framework = self
                    .retry
                    .execute("find_framework_by_slug", || {
                        self.frameworks.find_framework_by_slug(slug)
                    })
                    .await?;
                let Some(framework) = framework else {
                    return Ok(None);
                };
                let framework_id = framework.id;
                let libraries = self
                    .retry
                    .execute("list_libraries_for_framework", || {
                        self.libraries.list_libraries_for_framework(framework_id)
                    })
                    .await?;
                Ok::<_, RepoError>(Some((framework, libraries)))
            })
            .await?
            .ok_or_else(|| DirectoryError::not_found("framework", slug))?;

        let stats = self
            .stats
            .panel_for(framework.npm_package_name.as_deref(), window)
            .await;
        Ok(FrameworkDetail {
            framework,
            libraries,
            stats,
        })
    }

    /// Drop the cached listings and details a purged site path depends on.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let mut dropped = 0;
        for scope in keys::scopes_for_path(path) {
            dropped += match &scope {
                InvalidationScope::All => {
                    self.library_pages.invalidate_all()
                        + self.library_details.invalidate_all()
                        + self.framework_pages.invalidate_all()
                        + self.framework_details.invalidate_all()
                        + self.stats.invalidate_all()
                }
                InvalidationScope::Prefix(prefix) => {
                    self.library_pages.invalidate(prefix)
                        + self.library_details.invalidate(prefix)
                        + self.framework_pages.invalidate(prefix)
                        + self.framework_details.invalidate(prefix)
                }
            };
        }
        if dropped > 0 {
            info!(target = "uidir::directory", path, dropped, "local cache invalidated");
        }
        dropped
    }
}

// Frameworks carry no component count.
fn framework_sort(sort: SortBy) -> SortBy {
    match SortSpec::from(sort).column {
        SortColumn::TotalComponents => SortBy::Popular,
        _ => sort,
    }
}

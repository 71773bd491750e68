//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uidir_api_types::DailyDownloads;

use crate::domain::entities::{FrameworkRecord, LibraryRecord, LibrarySummary};
use crate::domain::error::DomainError;
use crate::domain::types::SortSpec;

/// Backend code reported when the data API's schema cache is stale.
pub const SCHEMA_CACHE_STALE_CODE: &str = "PGRST301";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("transient data-store failure: {message}")]
    Transient { message: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Connection-class failures, network failures and stale schema caches.
    pub fn is_transient(&self) -> bool {
        match self {
            RepoError::Transient { .. } | RepoError::Timeout => true,
            RepoError::Persistence(message) => is_transient_message(message),
            RepoError::NotFound | RepoError::InvalidInput { .. } => false,
        }
    }
}

pub(crate) fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("connection")
        || lowered.contains("network")
        || message.contains(SCHEMA_CACHE_STALE_CODE)
}

/// Zero-based inclusive row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub const DEFAULT_END: u32 = 19;
    pub const MAX_WIDTH: u32 = 100;

    pub fn new(start: u32, end: u32) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::validation(format!(
                "range end {end} precedes start {start}"
            )));
        }
        if end - start >= Self::MAX_WIDTH {
            return Err(DomainError::validation(format!(
                "range may span at most {} rows",
                Self::MAX_WIDTH
            )));
        }
        Ok(Self { start, end })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.end - self.start) + 1
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.start)
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: Self::DEFAULT_END,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LibraryQueryFilter {
    pub min_components: Option<u32>,
    pub min_downloads: Option<u64>,
    pub updated_within_days: Option<u32>,
    pub framework: Option<String>,
    pub search: Option<String>,
}

impl LibraryQueryFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryPage {
    pub libraries: Vec<LibrarySummary>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsCacheEntry {
    pub package_name: String,
    pub series: Vec<DailyDownloads>,
    pub last_updated: OffsetDateTime,
}

#[async_trait]
pub trait LibrariesRepo: Send + Sync {
    async fn list_libraries(
        &self,
        sort: SortSpec,
        filter: &LibraryQueryFilter,
        range: PageRange,
    ) -> Result<LibraryPage, RepoError>;

    async fn find_library_by_slug(&self, slug: &str)
    -> Result<Option<LibrarySummary>, RepoError>;

    async fn list_libraries_for_framework(
        &self,
        framework_id: i64,
    ) -> Result<Vec<LibraryRecord>, RepoError>;
}

#[async_trait]
pub trait FrameworksRepo: Send + Sync {
    async fn list_frameworks(
        &self,
        sort: SortSpec,
        range: PageRange,
    ) -> Result<(Vec<FrameworkRecord>, u64), RepoError>;

    async fn find_framework_by_slug(&self, slug: &str)
    -> Result<Option<FrameworkRecord>, RepoError>;
}

#[async_trait]
pub trait StatsCacheRepo: Send + Sync {
    async fn load_series(&self, package_name: &str)
    -> Result<Option<StatsCacheEntry>, RepoError>;

    async fn store_series(
        &self,
        package_name: &str,
        series: &[DailyDownloads],
        updated_at: OffsetDateTime,
    ) -> Result<(), RepoError>;
}

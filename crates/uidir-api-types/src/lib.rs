//! Shared request and response types for the uidir directory API.
//!
//! The server and the command-line revalidation client both speak these
//! shapes, so they live in a dependency-light crate of their own.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Listing order accepted by the `sortBy` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Popular,
    Latest,
    Components,
    Downloads,
    Name,
}

impl SortBy {
    pub const ALL: [SortBy; 5] = [
        SortBy::Popular,
        SortBy::Latest,
        SortBy::Components,
        SortBy::Downloads,
        SortBy::Name,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Popular => "popular",
            SortBy::Latest => "latest",
            SortBy::Components => "components",
            SortBy::Downloads => "downloads",
            SortBy::Name => "name",
        }
    }

    /// Parse a query value, falling back to [`SortBy::Popular`] for unknown input.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortBy(pub String);

impl fmt::Display for UnknownSortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sort key `{}`", self.0)
    }
}

impl std::error::Error for UnknownSortBy {}

impl FromStr for SortBy {
    type Err = UnknownSortBy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "popular" => Ok(SortBy::Popular),
            "latest" => Ok(SortBy::Latest),
            "components" => Ok(SortBy::Components),
            "downloads" => Ok(SortBy::Downloads),
            "name" => Ok(SortBy::Name),
            other => Err(UnknownSortBy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One day of registry download counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDownloads {
    #[serde(with = "iso_date")]
    pub day: Date,
    #[serde(default)]
    pub downloads: u64,
}

/// Latest-release facts pulled from a registry package document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub version: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    pub license: String,
    pub install_command: String,
}

/// Aggregated statistics rendered next to an entity detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPanel {
    pub package: String,
    pub window_days: u32,
    pub downloads: Vec<DailyDownloads>,
    pub total_downloads: u64,
    pub total_display: String,
    pub trending: bool,
    pub details: Option<PackageDetails>,
}

impl StatsPanel {
    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty() && self.details.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidateRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOutcome {
    pub path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidateResponse {
    pub message: String,
    pub results: Vec<PathOutcome>,
}

impl RevalidateResponse {
    pub fn failed(&self) -> impl Iterator<Item = &PathOutcome> {
        self.results.iter().filter(|outcome| !outcome.success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampResponse {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub environment: String,
}

//! Shared domain enumerations and validated value types.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use uidir_api_types::{SortBy, SortDirection};

use super::error::DomainError;

const PACKAGE_NAME_MAX_LEN: usize = 214;

/// Column a library listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    GithubStars,
    LastUpdate,
    TotalComponents,
    NpmDownloads,
    Name,
}

impl SortColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortColumn::GithubStars => "github_stars",
            SortColumn::LastUpdate => "last_update",
            SortColumn::TotalComponents => "total_components",
            SortColumn::NpmDownloads => "npm_downloads",
            SortColumn::Name => "name",
        }
    }
}

/// Resolved ordering for a listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

impl From<SortBy> for SortSpec {
    fn from(sort: SortBy) -> Self {
        match sort {
            SortBy::Popular => SortSpec::new(SortColumn::GithubStars, SortDirection::Desc),
            SortBy::Latest => SortSpec::new(SortColumn::LastUpdate, SortDirection::Desc),
            SortBy::Components => SortSpec::new(SortColumn::TotalComponents, SortDirection::Desc),
            SortBy::Downloads => SortSpec::new(SortColumn::NpmDownloads, SortDirection::Desc),
            SortBy::Name => SortSpec::new(SortColumn::Name, SortDirection::Asc),
        }
    }
}

/// Trailing window sizes used by the stats panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum StatsWindow {
    #[default]
    TwoWeeks,
    Month,
}

impl StatsWindow {
    pub fn days(self) -> u32 {
        match self {
            StatsWindow::TwoWeeks => 14,
            StatsWindow::Month => 30,
        }
    }
}

impl TryFrom<u32> for StatsWindow {
    type Error = DomainError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            14 => Ok(StatsWindow::TwoWeeks),
            30 => Ok(StatsWindow::Month),
            other => Err(DomainError::validation(format!(
                "stats window must be 14 or 30 days, got {other}"
            ))),
        }
    }
}

impl From<StatsWindow> for u32 {
    fn from(window: StatsWindow) -> Self {
        window.days()
    }
}

/// A registry package name, optionally scoped (`@scope/name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let name = raw.trim();
        if name.is_empty() || name.len() > PACKAGE_NAME_MAX_LEN {
            return Err(DomainError::invalid_package(name));
        }

        let bare = match name.strip_prefix('@') {
            Some(scoped) => {
                let (scope, rest) = scoped
                    .split_once('/')
                    .ok_or_else(|| DomainError::invalid_package(name))?;
                if !is_name_segment(scope) {
                    return Err(DomainError::invalid_package(name));
                }
                rest
            }
            None => name,
        };

        if !is_name_segment(bare) || bare.starts_with('.') || bare.starts_with('_') {
            return Err(DomainError::invalid_package(name));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segment form used by the registry document endpoint.
    pub fn encoded(&self) -> String {
        self.0.replace('/', "%2F")
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().all(|ch| {
            ch.is_ascii_lowercase()
                || ch.is_ascii_digit()
                || matches!(ch, '-' | '.' | '_' | '~')
        })
}

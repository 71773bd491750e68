//! Directory entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub icon_url: Option<String>,
    pub website_url: Option<String>,
    pub github_url: Option<String>,
    pub npm_url: Option<String>,
    pub npm_package_name: Option<String>,
    pub github_stars: Option<i64>,
    pub github_forks: Option<i64>,
    pub npm_downloads: Option<i64>,
    pub latest_version: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    pub pricing: Option<String>,
    pub styling: Option<String>,
    pub customization: Option<String>,
    pub installation_command: Option<String>,
    pub total_components: Option<i32>,
    pub gallery_images: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub icon_url: Option<String>,
    pub website_url: Option<String>,
    pub docs_url: Option<String>,
    pub github_url: Option<String>,
    pub npm_url: Option<String>,
    pub npm_package_name: Option<String>,
    pub installation_command: Option<String>,
    pub github_stars: Option<i64>,
    pub github_forks: Option<i64>,
    pub npm_downloads: Option<i64>,
    pub latest_version: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub rendering_type: Option<String>,
    pub language: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryFrameworkRecord {
    pub library_id: i64,
    pub framework_id: i64,
    pub is_primary: bool,
}

/// Framework reference attached to a listed library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkRef {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub icon_url: Option<String>,
    pub is_primary: bool,
}

/// A library row together with the frameworks it supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySummary {
    #[serde(flatten)]
    pub library: LibraryRecord,
    pub frameworks: Vec<FrameworkRef>,
}

impl LibrarySummary {
    pub fn supports_framework(&self, slug: &str) -> bool {
        self.frameworks.iter().any(|framework| framework.slug == slug)
    }

    pub fn primary_framework(&self) -> Option<&FrameworkRef> {
        self.frameworks.iter().find(|framework| framework.is_primary)
    }
}

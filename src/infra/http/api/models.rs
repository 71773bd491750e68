use serde::{Deserialize, Serialize};

use crate::domain::entities::LibrarySummary;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryListQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub sort_by: Option<String>,
    pub min_components: Option<String>,
    pub min_downloads: Option<String>,
    pub updated_within: Option<String>,
    pub framework: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameworkListQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WindowQuery {
    pub window: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LibraryListResponse {
    pub libraries: Vec<LibrarySummary>,
    pub total: u64,
}

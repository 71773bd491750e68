//! HTTP client for the package registry's download and metadata endpoints.

use std::time::Instant;

use async_trait::async_trait;

use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, warn};
use uidir_api_types::{DailyDownloads, PackageDetails};
use url::Url;

use crate::application::stats::{PackageRegistry, SourceError};
use crate::config::RegistrySettings;
use crate::domain::stats::DownloadWindow;
use crate::domain::types::PackageName;

use super::error::InfraError;

const UNKNOWN_LICENSE: &str = "Unknown";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry url: {0}")]
    Url(#[from] url::ParseError),
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry responded with status {status} for {url}")]
    Status { status: StatusCode, url: Url },
    #[error("registry document for `{package}` has no latest version")]
    MissingLatest { package: String },
}

#[derive(Debug, Deserialize)]
struct DownloadRangeBody {
    #[serde(default)]
    downloads: Vec<DailyDownloads>,
}

#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    downloads_base: Url,
    registry_base: Url,
}

impl RegistryClient {
    pub fn new(settings: &RegistrySettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|err| InfraError::http(format!("failed to build registry client: {err}")))?;

        Ok(Self {
            client,
            downloads_base: with_trailing_slash(settings.downloads_base_url.clone()),
            registry_base: with_trailing_slash(settings.registry_base_url.clone()),
        })
    }

    /// Daily downloads for the trailing window, empty on any failure.
    pub async fn get_download_series(
        &self,
        package: &PackageName,
        window_days: u32,
    ) -> Vec<DailyDownloads> {
        match self.fetch_download_series(package, window_days).await {
            Ok(series) => series,
            Err(err) => {
                warn!(
                    target = "uidir::registry",
                    package = %package,
                    window_days,
                    error = %err,
                    "download series unavailable"
                );
                Vec::new()
            }
        }
    }

    /// Latest-release details, `None` on any failure.
    pub async fn get_package_details(&self, package: &PackageName) -> Option<PackageDetails> {
        match self.fetch_package_details(package).await {
            Ok(details) => Some(details),
            Err(err) => {
                warn!(
                    target = "uidir::registry",
                    package = %package,
                    error = %err,
                    "package details unavailable"
                );
                None
            }
        }
    }

    pub async fn fetch_download_series(
        &self,
        package: &PackageName,
        window_days: u32,
    ) -> Result<Vec<DailyDownloads>, RegistryError> {
        let window = DownloadWindow::current(window_days);
        let url = self.downloads_base.join(&format!(
            "downloads/range/{}/{}",
            window.range_segment(),
            package.as_str()
        ))?;

        let body: DownloadRangeBody = self.get_json("downloads", url).await?;
        Ok(body.downloads)
    }

    pub async fn fetch_package_details(
        &self,
        package: &PackageName,
    ) -> Result<PackageDetails, RegistryError> {
        let url = self.registry_base.join(&package.encoded())?;
        let document: Value = self.get_json("document", url).await?;
        parse_package_document(package, &document)
    }

    async fn get_json<T>(&self, endpoint: &'static str, url: Url) -> Result<T, RegistryError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let started = Instant::now();
        debug!(target = "uidir::registry", %url, endpoint, "registry request");

        let outcome = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RegistryError::Status { status, url });
            }
            Ok(response.json::<T>().await?)
        }
        .await;

        histogram!("uidir_registry_request_ms", "endpoint" => endpoint)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if outcome.is_err() {
            counter!("uidir_registry_error_total", "endpoint" => endpoint).increment(1);
        }
        outcome
    }
}

impl From<RegistryError> for SourceError {
    fn from(err: RegistryError) -> Self {
        SourceError::new(err.to_string())
    }
}

#[async_trait]
impl PackageRegistry for RegistryClient {
    async fn download_series(
        &self,
        package: &PackageName,
        window_days: u32,
    ) -> Result<Vec<DailyDownloads>, SourceError> {
        Ok(self.fetch_download_series(package, window_days).await?)
    }

    async fn package_details(&self, package: &PackageName) -> Result<PackageDetails, SourceError> {
        Ok(self.fetch_package_details(package).await?)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_package_document(
    package: &PackageName,
    document: &Value,
) -> Result<PackageDetails, RegistryError> {
    let latest = document
        .pointer("/dist-tags/latest")
        .and_then(Value::as_str)
        .ok_or_else(|| RegistryError::MissingLatest {
            package: package.to_string(),
        })?;

    let last_update = document
        .get("time")
        .and_then(|times| times.get(latest))
        .and_then(Value::as_str)
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok());

    let license = document
        .get("versions")
        .and_then(|versions| versions.get(latest))
        .and_then(|version| version.get("license"))
        .and_then(license_name)
        .unwrap_or_else(|| UNKNOWN_LICENSE.to_string());

    Ok(PackageDetails {
        version: latest.to_string(),
        last_update,
        license,
        install_command: format!("npm install {package}"),
    })
}

// Older manifests carry `{ "type": "MIT", "url": ... }` instead of an SPDX string.
fn license_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Object(map) => map
            .get("type")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

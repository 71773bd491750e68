//! Registry statistics with a layered cache.
//!
//! Lookups go to the in-memory [`TtlCache`] first, then to the durable
//! `package_stats_cache` row when one is configured and young enough, and only
//! then to the registry. A registry answer is written back to both tiers.
//! Failures are never cached; callers get an empty series or no details.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uidir_api_types::{DailyDownloads, PackageDetails, StatsPanel};

use crate::application::repos::StatsCacheRepo;
use crate::cache::{CacheConfig, TtlCache, keys};
use crate::domain::stats::{DownloadWindow, build_panel, empty_panel};
use crate::domain::types::{PackageName, StatsWindow};

const DEFAULT_DURABLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Network source of download counts and release metadata.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn download_series(
        &self,
        package: &PackageName,
        window_days: u32,
    ) -> Result<Vec<DailyDownloads>, SourceError>;

    async fn package_details(&self, package: &PackageName) -> Result<PackageDetails, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsConfig {
    pub durable_enabled: bool,
    pub durable_ttl: Duration,
    pub default_window: StatsWindow,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            durable_enabled: true,
            durable_ttl: DEFAULT_DURABLE_TTL,
            default_window: StatsWindow::default(),
        }
    }
}

impl From<&crate::config::StatsSettings> for StatsConfig {
    fn from(settings: &crate::config::StatsSettings) -> Self {
        Self {
            durable_enabled: settings.durable_enabled,
            durable_ttl: settings.durable_ttl,
            default_window: settings.default_window,
        }
    }
}

pub struct StatsService {
    registry: Arc<dyn PackageRegistry>,
    durable: Option<Arc<dyn StatsCacheRepo>>,
    config: StatsConfig,
    ttl: Duration,
    series: TtlCache<Vec<DailyDownloads>>,
    details: TtlCache<PackageDetails>,
}

impl StatsService {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        durable: Option<Arc<dyn StatsCacheRepo>>,
        config: StatsConfig,
        cache: &CacheConfig,
    ) -> Self {
        let ttl = cache.effective_stats_ttl();
        Self {
            registry,
            durable: durable.filter(|_| config.durable_enabled),
            config,
            ttl,
            series: TtlCache::new("npm_stats", ttl, cache),
            details: TtlCache::new("npm_details", ttl, cache),
        }
    }

    pub fn default_window(&self) -> StatsWindow {
        self.config.default_window
    }

    /// Daily downloads over the trailing window; empty when nothing could be fetched.
    pub async fn download_series(
        &self,
        package: &PackageName,
        window: StatsWindow,
    ) -> Vec<DailyDownloads> {
        match self.try_download_series(package, window).await {
            Ok(series) => series,
            Err(err) => {
                warn!(
                    target = "uidir::stats",
                    package = %package,
                    window_days = window.days(),
                    error = %err,
                    "download series unavailable"
                );
                Vec::new()
            }
        }
    }

    pub async fn package_details(&self, package: &PackageName) -> Option<PackageDetails> {
        match self.try_package_details(package).await {
            Ok(details) => Some(details),
            Err(err) => {
                warn!(
                    target = "uidir::stats",
                    package = %package,
                    error = %err,
                    "package details unavailable"
                );
                None
            }
        }
    }

    pub async fn panel(&self, package: &PackageName, window: StatsWindow) -> StatsPanel {
        let (series, details) = tokio::join!(
            self.download_series(package, window),
            self.package_details(package)
        );
        build_panel(package.as_str(), window.days(), &series, details)
    }

    /// Panel for an entity's package column; malformed names degrade to an empty panel.
    pub async fn panel_for(
        &self,
        package: Option<&str>,
        window: StatsWindow,
    ) -> Option<StatsPanel> {
        let raw = package.map(str::trim).filter(|raw| !raw.is_empty())?;
        match PackageName::parse(raw) {
            Ok(name) => Some(self.panel(&name, window).await),
            Err(err) => {
                debug!(target = "uidir::stats", package = raw, error = %err, "skipping stats");
                Some(empty_panel(raw, window.days()))
            }
        }
    }

    pub async fn try_download_series(
        &self,
        package: &PackageName,
        window: StatsWindow,
    ) -> Result<Vec<DailyDownloads>, SourceError> {
        let key = keys::npm_stats(package.as_str(), window.days());
        self.series
            .get_or_fetch_with_ttl(&key, self.ttl, move || async move {
                let range = DownloadWindow::current(window.days());
                if let Some(series) = self.load_durable(package, range).await {
                    return Ok(series);
                }

                let series = self
                    .registry
                    .download_series(package, window.days())
                    .await?;
                self.store_durable(package, &series).await;
                Ok(series)
            })
            .await
    }

    pub async fn try_package_details(
        &self,
        package: &PackageName,
    ) -> Result<PackageDetails, SourceError> {
        let key = keys::npm_details(package.as_str());
        self.details
            .get_or_fetch_with_ttl(&key, self.ttl, move || self.registry.package_details(package))
            .await
    }

    /// Drop every in-memory entry for `package`; returns how many were removed.
    pub fn invalidate(&self, package: &PackageName) -> usize {
        let name = package.as_str();
        let series = [StatsWindow::TwoWeeks, StatsWindow::Month]
            .into_iter()
            .filter(|window| self.series.remove(&keys::npm_stats(name, window.days())))
            .count();
        series + usize::from(self.details.remove(&keys::npm_details(name)))
    }

    pub fn invalidate_all(&self) -> usize {
        self.series.invalidate_all() + self.details.invalidate_all()
    }

    async fn load_durable(
        &self,
        package: &PackageName,
        range: DownloadWindow,
    ) -> Option<Vec<DailyDownloads>> {
        let repo = self.durable.as_ref()?;
        let entry = match repo.load_series(package.as_str()).await {
            Ok(entry) => entry?,
            Err(err) => {
                warn!(
                    target = "uidir::stats",
                    package = %package,
                    error = %err,
                    "durable stats lookup failed"
                );
                return None;
            }
        };

        let age = OffsetDateTime::now_utc() - entry.last_updated;
        let max_age = i64::try_from(self.config.durable_ttl.as_secs()).unwrap_or(i64::MAX);
        if age.whole_seconds() >= max_age {
            return None;
        }

        let days = range.slice(&entry.series)?;
        counter!("uidir_stats_durable_hit_total").increment(1);
        Some(days.to_vec())
    }

    async fn store_durable(&self, package: &PackageName, series: &[DailyDownloads]) {
        let Some(repo) = self.durable.as_ref() else {
            return;
        };
        if series.is_empty() {
            return;
        }
        if let Err(err) = repo
            .store_series(package.as_str(), series, OffsetDateTime::now_utc())
            .await
        {
            warn!(
                target = "uidir::stats",
                package = %package,
                error = %err,
                "durable stats write failed"
            );
        }
    }
}

//! Download-series arithmetic used by the stats panels.
//!
//! Series are ordered oldest-first and are never deduplicated here; callers
//! decide how many trailing partial days to drop before display.

use time::{Date, Duration, OffsetDateTime};
use uidir_api_types::{DailyDownloads, PackageDetails, StatsPanel};

/// Growth of the second half over the first half required to flag a package as trending.
pub const TRENDING_THRESHOLD: f64 = 0.15;
/// Shorter series never count as trending.
pub const TRENDING_MIN_DAYS: usize = 7;
/// Most recent days the registry may still be backfilling.
pub const PARTIAL_TAIL_DAYS: usize = 2;
/// Days shown by a stats panel.
pub const PANEL_DAYS: usize = 7;

/// Inclusive day range ending yesterday, so no partial day is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadWindow {
    pub start: Date,
    pub end: Date,
}

impl DownloadWindow {
    pub fn ending_yesterday(today: Date, window_days: u32) -> Self {
        let end = today - Duration::days(1);
        let start = end - Duration::days(i64::from(window_days));
        Self { start, end }
    }

    pub fn current(window_days: u32) -> Self {
        Self::ending_yesterday(OffsetDateTime::now_utc().date(), window_days)
    }

    /// `start:end` segment of the registry range endpoint.
    pub fn range_segment(&self) -> String {
        format!("{}:{}", iso_day(self.start), iso_day(self.end))
    }

    /// Days of `series` that fall inside this window, or `None` when the
    /// series starts after the window does.
    pub fn slice<'a>(&self, series: &'a [DailyDownloads]) -> Option<&'a [DailyDownloads]> {
        let first = series.first()?;
        if first.day > self.start {
            return None;
        }
        let from = series.partition_point(|day| day.day < self.start);
        let to = series.partition_point(|day| day.day <= self.end);
        Some(&series[from..to.max(from)])
    }
}

fn iso_day(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn total_downloads(series: &[DailyDownloads]) -> u64 {
    series
        .iter()
        .fold(0u64, |acc, day| acc.saturating_add(day.downloads))
}

/// Compare mean downloads of the two halves of `series`.
pub fn is_trending(series: &[DailyDownloads]) -> bool {
    if series.len() < TRENDING_MIN_DAYS {
        return false;
    }

    let (first, second) = series.split_at(series.len() / 2);
    let first_mean = mean(first);
    let second_mean = mean(second);

    if first_mean == 0.0 {
        return second_mean > 0.0;
    }

    (second_mean - first_mean) / first_mean >= TRENDING_THRESHOLD
}

fn mean(series: &[DailyDownloads]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    total_downloads(series) as f64 / series.len() as f64
}

/// Drop the `days` most recent entries.
pub fn trim_tail(series: &[DailyDownloads], days: usize) -> &[DailyDownloads] {
    &series[..series.len().saturating_sub(days)]
}

/// Keep only the `days` most recent entries.
pub fn last_days(series: &[DailyDownloads], days: usize) -> &[DailyDownloads] {
    &series[series.len().saturating_sub(days)..]
}

/// Compact human rendering: `1.2M`, `3.4k`, `999`.
pub fn format_downloads(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Assemble the panel shown next to an entity: the settled last week plus totals.
pub fn build_panel(
    package: &str,
    window_days: u32,
    series: &[DailyDownloads],
    details: Option<PackageDetails>,
) -> StatsPanel {
    let settled = trim_tail(series, PARTIAL_TAIL_DAYS);
    let shown = last_days(settled, PANEL_DAYS).to_vec();
    let total = total_downloads(&shown);

    StatsPanel {
        package: package.to_string(),
        window_days,
        total_display: format_downloads(total),
        total_downloads: total,
        trending: is_trending(series),
        downloads: shown,
        details,
    }
}

/// Panel used when nothing could be fetched for a package.
pub fn empty_panel(package: &str, window_days: u32) -> StatsPanel {
    build_panel(package, window_days, &[], None)
}

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "uidir_cache_hit_total",
            Unit::Count,
            "Lookups served from a fresh in-memory cache entry."
        );
        describe_counter!(
            "uidir_cache_miss_total",
            Unit::Count,
            "Lookups that had to run their fetch."
        );
        describe_counter!(
            "uidir_cache_store_total",
            Unit::Count,
            "Values written into an in-memory cache."
        );
        describe_counter!(
            "uidir_cache_expired_total",
            Unit::Count,
            "Entries dropped on read because their TTL had elapsed."
        );
        describe_counter!(
            "uidir_cache_evict_total",
            Unit::Count,
            "Entries evicted due to capacity."
        );
        describe_counter!(
            "uidir_cache_invalidate_total",
            Unit::Count,
            "Entries removed by explicit invalidation."
        );
        describe_counter!(
            "uidir_stats_durable_hit_total",
            Unit::Count,
            "Download series served from the durable stats table."
        );
        describe_counter!(
            "uidir_retry_attempt_total",
            Unit::Count,
            "Data-store calls retried after a transient failure."
        );
        describe_counter!(
            "uidir_retry_exhausted_total",
            Unit::Count,
            "Data-store calls that failed after every retry."
        );
        describe_histogram!(
            "uidir_registry_request_ms",
            Unit::Milliseconds,
            "Package registry request latency in milliseconds."
        );
        describe_counter!(
            "uidir_registry_error_total",
            Unit::Count,
            "Package registry requests that failed."
        );
        describe_counter!(
            "uidir_revalidate_path_total",
            Unit::Count,
            "Paths submitted to the purge backend, labelled by outcome."
        );
    });
}

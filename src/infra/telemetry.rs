use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    filter::Targets,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Targets mirrored into the cache log file.
const CACHE_LOG_TARGETS: [&str; 3] = [
    "lexicache::cache",
    "lexicache::application::warmer",
    "lexicache::application::jobs",
];

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
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    let cache_log_layer = logging
        .cache_log_path
        .as_deref()
        .map(cache_log_layer)
        .transpose()?;

    tracing_subscriber::registry()
        .with(cache_log_layer)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Plain-text layer appending cache and warmer events to `path`.
///
/// Carries its own target filter so the file keeps debug-level cache events
/// regardless of the console level.
fn cache_log_layer<S>(path: &Path) -> Result<Box<dyn Layer<S> + Send + Sync + 'static>, InfraError>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            InfraError::telemetry(format!(
                "failed to open cache log `{}`: {err}",
                path.display()
            ))
        })?;

    let targets = CACHE_LOG_TARGETS
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, LevelFilter::DEBUG)
        });

    Ok(fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_filter(targets)
        .boxed())
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "lexicache_cache_hit_total",
            Unit::Count,
            "Total number of cache hits, labelled by tier."
        );
        describe_counter!(
            "lexicache_cache_miss_total",
            Unit::Count,
            "Total number of lookups that missed both tiers."
        );
        describe_counter!(
            "lexicache_cache_promotion_total",
            Unit::Count,
            "Total number of far-tier hits copied into the near tier."
        );
        describe_counter!(
            "lexicache_cache_evict_total",
            Unit::Count,
            "Total number of entries evicted due to capacity, labelled by tier."
        );
        describe_counter!(
            "lexicache_cache_expired_total",
            Unit::Count,
            "Total number of expired entries removed by the sweep, labelled by tier."
        );
        describe_histogram!(
            "lexicache_warm_ms",
            Unit::Milliseconds,
            "Cache warm latency in milliseconds."
        );
        describe_counter!(
            "lexicache_warm_skipped_total",
            Unit::Count,
            "Total number of warm requests skipped because a warm was running."
        );
        describe_counter!(
            "lexicache_warm_failed_total",
            Unit::Count,
            "Total number of warms that failed."
        );
    });
}

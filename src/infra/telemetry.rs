use metrics::{Unit, describe_counter};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(logging.level).into())
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
    describe_counter!(
        "circle_cache_hit_total",
        Unit::Count,
        "Total number of result-cache hits."
    );
    describe_counter!(
        "circle_cache_miss_total",
        Unit::Count,
        "Total number of result-cache misses."
    );
    describe_counter!(
        "circle_cache_invalidated_total",
        Unit::Count,
        "Total number of cache entries evicted by prefix invalidation."
    );
    describe_counter!(
        "circle_events_published_total",
        Unit::Count,
        "Total number of mutation events handed to the fan-out channel."
    );
}

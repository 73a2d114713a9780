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
            "blogdeck_query_cache_hit_total",
            Unit::Count,
            "Query cache lookups answered from a fresh entry."
        );
        describe_counter!(
            "blogdeck_query_cache_miss_total",
            Unit::Count,
            "Query cache lookups that started a fetch."
        );
        describe_counter!(
            "blogdeck_query_cache_coalesced_total",
            Unit::Count,
            "Query cache lookups that joined an in-flight fetch."
        );
        describe_counter!(
            "blogdeck_query_cache_invalidated_total",
            Unit::Count,
            "Query cache entries marked stale by a write."
        );
        describe_counter!(
            "blogdeck_query_cache_evict_total",
            Unit::Count,
            "Query cache entries evicted due to capacity."
        );
        describe_counter!(
            "blogdeck_notification_sent_total",
            Unit::Count,
            "New-post notification e-mails accepted by the relay."
        );
        describe_counter!(
            "blogdeck_notification_failed_total",
            Unit::Count,
            "New-post notification e-mails that failed to send."
        );
        describe_histogram!(
            "blogdeck_http_request_duration_ms",
            Unit::Milliseconds,
            "Latency of handled HTTP requests."
        );
    });
}

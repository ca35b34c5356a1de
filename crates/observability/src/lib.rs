use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    turns_total: AtomicU64,
    model_calls_total: AtomicU64,
    gateway_errors_total: AtomicU64,
    security_rejections_total: AtomicU64,
    non_travel_total: AtomicU64,
    itineraries_total: AtomicU64,
    validation_failures_total: AtomicU64,
    heartbeats_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_total: u64,
    pub model_calls_total: u64,
    pub gateway_errors_total: u64,
    pub security_rejections_total: u64,
    pub non_travel_total: u64,
    pub itineraries_total: u64,
    pub validation_failures_total: u64,
    pub heartbeats_total: u64,
    pub avg_turn_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_turn(&self) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_model_call(&self) {
        self.model_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_gateway_error(&self) {
        self.gateway_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_security_rejection(&self) {
        self.security_rejections_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_non_travel(&self) {
        self.non_travel_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_itinerary(&self) {
        self.itineraries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_validation_failure(&self) {
        self.validation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// One tick of the in-flight model call heartbeat.
    pub fn inc_heartbeat(&self) {
        self.heartbeats_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let turns = self.turns_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            turns_total: turns,
            model_calls_total: self.model_calls_total.load(Ordering::Relaxed),
            gateway_errors_total: self.gateway_errors_total.load(Ordering::Relaxed),
            security_rejections_total: self.security_rejections_total.load(Ordering::Relaxed),
            non_travel_total: self.non_travel_total.load(Ordering::Relaxed),
            itineraries_total: self.itineraries_total.load(Ordering::Relaxed),
            validation_failures_total: self.validation_failures_total.load(Ordering::Relaxed),
            heartbeats_total: self.heartbeats_total.load(Ordering::Relaxed),
            avg_turn_latency_millis: if turns == 0 {
                0.0
            } else {
                latency as f64 / turns as f64
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, event fields flattened, `turn_id` from the turn span.
    Json,
    /// Human-readable single-line output for interactive CLI sessions.
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "pretty" | "text" => Self::Compact,
            _ => Self::Json,
        }
    }

    pub fn from_env() -> Self {
        env::var("TRIPWISE_LOG_FORMAT")
            .map(|value| Self::parse(&value))
            .unwrap_or(Self::Json)
    }
}

/// Service at info, the dialogue pipeline at info, pure core logic at warn.
pub fn default_filter(service_name: &str) -> String {
    format!("{service_name}=info,tripwise_agents=info,tripwise_core=warn")
}

/// Logs go to stderr so stdout stays clean for CLI output.
pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(service_name)));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true);

        let format = LogFormat::from_env();
        match format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .init(),
            LogFormat::Compact => builder.compact().init(),
        }
        tracing::debug!(service = service_name, ?format, "tracing initialised");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_per_turn() {
        let metrics = AppMetrics::shared();
        metrics.inc_turn();
        metrics.inc_turn();
        metrics.inc_model_call();
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.turns_total, 2);
        assert_eq!(snapshot.model_calls_total, 1);
        assert_eq!(snapshot.avg_turn_latency_millis, 20.0);
        assert_eq!(snapshot.heartbeats_total, 0);
    }

    #[test]
    fn log_format_defaults_to_json() {
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse(" Pretty "), LogFormat::Compact);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn default_filter_names_the_service() {
        assert_eq!(
            default_filter("tripwise_cli"),
            "tripwise_cli=info,tripwise_agents=info,tripwise_core=warn"
        );
    }
}

use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tripwise_core::{classify_failure, suggested_backoff, GatewayError, GatewayErrorKind};
use tripwise_observability::AppMetrics;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    JsonSchema { name: &'static str, schema: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Short tag for logs: `intent`, `extraction`, `itinerary`.
    pub purpose: &'static str,
    pub instructions: String,
    pub input: String,
    pub format: ResponseFormat,
}

/// The generative model endpoint. Implementations return the raw reply text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: &ModelRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub min_interval: Duration,
    pub call_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1_000),
            call_timeout: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(30),
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_interval: env_number("TRIPWISE_MIN_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_interval),
            call_timeout: env_number("TRIPWISE_CALL_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
            heartbeat_interval: env_number("TRIPWISE_HEARTBEAT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            ..defaults
        }
    }
}

fn env_number<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

/// Single entry point for model calls. Spaces dispatches at least
/// `min_interval` apart within this process, bounds each call with a hard
/// timeout, and turns provider failures into classified, user-safe errors.
/// Never retries.
pub struct ModelGateway {
    client: Arc<dyn ModelClient>,
    config: GatewayConfig,
    last_dispatch: Mutex<Option<Instant>>,
    rate_limit_streak: AtomicU32,
    metrics: Arc<AppMetrics>,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn ModelClient>, config: GatewayConfig, metrics: Arc<AppMetrics>) -> Self {
        Self {
            client,
            config,
            last_dispatch: Mutex::new(None),
            rate_limit_streak: AtomicU32::new(0),
            metrics,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Waits out the remainder of `min_interval` and stamps the dispatch time.
    /// The lock is held across the wait so concurrent callers queue up.
    async fn throttle(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = Instant::now().saturating_duration_since(previous);
            if elapsed < self.config.min_interval {
                let wait = self.config.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "throttling model dispatch");
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn invoke(&self, request: ModelRequest) -> Result<String, GatewayError> {
        self.throttle().await;
        self.metrics.inc_model_call();

        let started = Instant::now();
        let heartbeat_every = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(started + heartbeat_every, heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = sleep(self.config.call_timeout);
        let call = self.client.complete(&request);
        tokio::pin!(deadline);
        tokio::pin!(call);

        let outcome = loop {
            tokio::select! {
                result = &mut call => break Some(result),
                _ = &mut deadline => break None,
                _ = heartbeat.tick() => {
                    self.metrics.inc_heartbeat();
                    info!(
                        purpose = request.purpose,
                        elapsed_secs = started.elapsed().as_secs(),
                        "model call still in flight"
                    );
                }
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Some(Ok(text)) => {
                self.rate_limit_streak.store(0, Ordering::Relaxed);
                debug!(purpose = request.purpose, elapsed_ms, "model call completed");
                Ok(text)
            }
            Some(Err(err)) => {
                let error = self.classify(&format!("{err:#}"));
                self.metrics.inc_gateway_error();
                warn!(
                    purpose = request.purpose,
                    kind = error.kind.as_str(),
                    elapsed_ms,
                    suggested_backoff_ms = error.suggested_backoff.map(|d| d.as_millis() as u64),
                    "model call failed"
                );
                Err(error)
            }
            None => {
                self.metrics.inc_gateway_error();
                warn!(
                    purpose = request.purpose,
                    kind = GatewayErrorKind::Timeout.as_str(),
                    elapsed_ms,
                    "model call timed out"
                );
                Err(GatewayError::timeout(self.config.call_timeout))
            }
        }
    }

    fn classify(&self, message: &str) -> GatewayError {
        let kind = classify_failure(message);
        let error = GatewayError::new(kind, message);
        if kind == GatewayErrorKind::RateLimited {
            let streak = self.rate_limit_streak.fetch_add(1, Ordering::Relaxed) + 1;
            error.with_backoff(suggested_backoff(
                streak,
                self.config.backoff_base,
                self.config.backoff_cap,
            ))
        } else {
            error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    struct StubClient {
        dispatches: SyncMutex<Vec<Instant>>,
        delay: Duration,
        failure: Option<&'static str>,
    }

    impl StubClient {
        fn new(delay: Duration, failure: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                dispatches: SyncMutex::new(Vec::new()),
                delay,
                failure,
            })
        }
    }

    #[async_trait]
    impl ModelClient for StubClient {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: &ModelRequest) -> Result<String> {
            self.dispatches.lock().push(Instant::now());
            sleep(self.delay).await;
            match self.failure {
                Some(message) => anyhow::bail!(message),
                None => Ok("ok".to_string()),
            }
        }
    }

    fn request() -> ModelRequest {
        ModelRequest {
            purpose: "test",
            instructions: String::new(),
            input: "hello".to_string(),
            format: ResponseFormat::Text,
        }
    }

    fn gateway(client: Arc<StubClient>) -> ModelGateway {
        gateway_with_metrics(client, AppMetrics::shared())
    }

    fn gateway_with_metrics(client: Arc<StubClient>, metrics: Arc<AppMetrics>) -> ModelGateway {
        ModelGateway::new(client, GatewayConfig::default(), metrics)
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_dispatches_are_spaced() {
        let client = StubClient::new(Duration::from_millis(10), None);
        let gateway = gateway(client.clone());

        gateway.invoke(request()).await.unwrap();
        gateway.invoke(request()).await.unwrap();
        gateway.invoke(request()).await.unwrap();

        let dispatches = client.dispatches.lock().clone();
        assert_eq!(dispatches.len(), 3);
        for pair in dispatches.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_serialized() {
        let client = StubClient::new(Duration::from_millis(5), None);
        let gateway = Arc::new(gateway(client.clone()));

        let a = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.invoke(request()).await }
        });
        let b = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.invoke(request()).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let mut dispatches = client.dispatches.lock().clone();
        dispatches.sort();
        assert!(dispatches[1] - dispatches[0] >= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out_with_distinct_error() {
        let client = StubClient::new(Duration::from_secs(600), None);
        let gateway = gateway(client);

        let started = Instant::now();
        let err = gateway.invoke(request()).await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Timeout);
        assert_eq!(started.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_ticks_only_while_call_is_in_flight() {
        let metrics = AppMetrics::shared();
        let client = StubClient::new(Duration::from_secs(65), None);
        let gateway = gateway_with_metrics(client, metrics.clone());

        gateway.invoke(request()).await.unwrap();
        assert_eq!(metrics.snapshot().heartbeats_total, 2);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(metrics.snapshot().heartbeats_total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_calls_emit_no_heartbeat() {
        let metrics = AppMetrics::shared();
        let client = StubClient::new(Duration::from_secs(29), None);
        gateway_with_metrics(client, metrics.clone())
            .invoke(request())
            .await
            .unwrap();

        assert_eq!(metrics.snapshot().heartbeats_total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_surface_growing_backoff_without_retry() {
        let client = StubClient::new(Duration::ZERO, Some("status 429: Too Many Requests"));
        let gateway = gateway(client.clone());

        let first = gateway.invoke(request()).await.unwrap_err();
        let second = gateway.invoke(request()).await.unwrap_err();

        assert_eq!(first.kind, GatewayErrorKind::RateLimited);
        assert_eq!(first.suggested_backoff, Some(Duration::from_secs(5)));
        assert_eq!(second.suggested_backoff, Some(Duration::from_secs(10)));
        assert_eq!(client.dispatches.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_user_safe() {
        let client = StubClient::new(Duration::ZERO, Some("status 401: invalid api key sk-abc"));
        let err = gateway(client).invoke(request()).await.unwrap_err();

        assert_eq!(err.kind, GatewayErrorKind::Authentication);
        assert!(err.suggested_backoff.is_none());
        assert!(!err.to_string().contains("sk-abc"));
    }
}

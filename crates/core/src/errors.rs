use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    Timeout,
    RateLimited,
    Network,
    Authentication,
    Quota,
    ContentBlocked,
    Unknown,
}

impl GatewayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Network => "network",
            Self::Authentication => "authentication",
            Self::Quota => "quota",
            Self::ContentBlocked => "content_blocked",
            Self::Unknown => "unknown",
        }
    }

    /// Wording shown to the traveler. Never includes provider detail.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Timeout => {
                "The planner took too long to respond. Please try again in a moment."
            }
            Self::RateLimited => {
                "The planner is receiving a lot of requests right now. Please wait a few seconds and try again."
            }
            Self::Network => {
                "I couldn't reach the planning service. Please check your connection and try again."
            }
            Self::Authentication => {
                "The planning service is not configured correctly. Please contact support."
            }
            Self::Quota => {
                "The planning service has reached its usage limit. Please try again later."
            }
            Self::ContentBlocked => {
                "I can't help with that request. Please rephrase it as a travel question."
            }
            Self::Unknown => "Something went wrong while planning your trip. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{}", .kind.user_message())]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    /// Advisory only; nothing retries automatically.
    pub suggested_backoff: Option<Duration>,
    /// Provider-side detail for logs. Not shown to users.
    pub detail: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            suggested_backoff: None,
            detail: detail.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            GatewayErrorKind::Timeout,
            format!("model call exceeded {}s", after.as_secs()),
        )
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.suggested_backoff = Some(backoff);
        self
    }
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

/// Buckets a provider failure by its message text.
pub fn classify_failure(message: &str) -> GatewayErrorKind {
    let lower = message.to_lowercase();

    if contains_any(&lower, &["timeout", "timed out", "deadline exceeded"]) {
        GatewayErrorKind::Timeout
    } else if contains_any(
        &lower,
        &["quota", "billing", "insufficient_quota", "payment required", "status 402"],
    ) {
        GatewayErrorKind::Quota
    } else if contains_any(
        &lower,
        &["429", "rate limit", "rate_limit", "too many requests", "resource_exhausted"],
    ) {
        GatewayErrorKind::RateLimited
    } else if contains_any(
        &lower,
        &[
            "401",
            "403",
            "unauthorized",
            "forbidden",
            "api key",
            "api_key",
            "authentication",
            "permission denied",
        ],
    ) {
        GatewayErrorKind::Authentication
    } else if contains_any(
        &lower,
        &["safety", "content policy", "content_filter", "content filter", "blocked", "harm_category"],
    ) {
        GatewayErrorKind::ContentBlocked
    } else if contains_any(
        &lower,
        &[
            "network",
            "connection",
            "connect error",
            "dns",
            "econnrefused",
            "econnreset",
            "socket",
            "fetch failed",
            "unreachable",
        ],
    ) {
        GatewayErrorKind::Network
    } else {
        GatewayErrorKind::Unknown
    }
}

/// Exponential backoff suggestion: `base * 2^(streak - 1)`, capped.
pub fn suggested_backoff(streak: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = streak.saturating_sub(1).min(16);
    base.saturating_mul(1_u32 << exponent).min(cap)
}

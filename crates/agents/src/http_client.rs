use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::gateway::{ModelClient, ModelRequest, ResponseFormat};

const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct ModelRuntimeConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub reasoning_effort: Option<String>,
    /// Transport-level ceiling; the gateway's own timeout is normally shorter.
    pub request_timeout: Duration,
}

impl ModelRuntimeConfig {
    /// `None` when no API key is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("TRIPWISE_MODEL_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())?;
        let model = env::var("TRIPWISE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url = env::var("TRIPWISE_MODEL_BASE_URL")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let reasoning_effort = env::var("TRIPWISE_REASONING_EFFORT")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Some(Self {
            api_key,
            model,
            base_url,
            reasoning_effort,
            request_timeout: Duration::from_secs(180),
        })
    }
}

/// Talks to an OpenAI-style `/responses` endpoint.
pub struct HttpModelClient {
    http: Client,
    runtime: ModelRuntimeConfig,
}

impl HttpModelClient {
    pub fn new(runtime: ModelRuntimeConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(runtime.request_timeout)
            .build()
            .context("failed to build model http client")?;
        Ok(Self { http, runtime })
    }

    fn payload(&self, request: &ModelRequest) -> Value {
        let mut payload = json!({
            "model": self.runtime.model,
            "input": [
                {
                    "role": "system",
                    "content": [
                        { "type": "input_text", "text": request.instructions }
                    ]
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": request.input }
                    ]
                }
            ]
        });

        if let ResponseFormat::JsonSchema { name, schema } = &request.format {
            payload["text"] = json!({
                "format": {
                    "type": "json_schema",
                    "name": name,
                    "schema": schema,
                    "strict": true
                }
            });
        }
        if let Some(effort) = &self.runtime.reasoning_effort {
            payload["reasoning"] = json!({ "effort": effort });
        }
        payload
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn model_name(&self) -> &str {
        &self.runtime.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/responses", self.runtime.base_url))
            .bearer_auth(self.runtime.api_key.as_str())
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|err| {
                let kind = if err.is_timeout() {
                    "timed out"
                } else if err.is_connect() {
                    "connection failed"
                } else {
                    "network error"
                };
                anyhow::anyhow!("model request {kind}: {err}")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("model endpoint returned status {}: {}", status.as_u16(), body);
        }

        let body: Value = response
            .json()
            .await
            .context("model response parse failed")?;
        extract_output_text(&body)
            .filter(|value| !value.trim().is_empty())
            .context("model output text missing")
    }
}

pub fn extract_output_text(payload: &Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(Value::as_str) {
        return Some(value.to_string());
    }

    let chunks = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|content| content.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|content| content.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}

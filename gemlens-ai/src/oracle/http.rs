// HTTP Vision Oracle
//
// OpenAI-compatible chat-completions client. One request per image and stage,
// with the answer constrained by a strict JSON schema (response_format).
// Rate limited per client; every request bounded by the configured timeout.

use super::{OracleRequest, VisionOracle};
use crate::error::{AnalysisError, AnalysisResult};
use async_trait::async_trait;
use gemlens_common::config::{resolve_oracle_api_key, OracleConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Chat-completions vision oracle
pub struct HttpVisionOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    rate_limiter: DirectRateLimiter,
}

impl HttpVisionOracle {
    /// Create a client for the configured endpoint
    ///
    /// # Errors
    /// Returns `Oracle` if the HTTP client cannot be built
    pub fn new(config: &OracleConfig, api_key: String) -> AnalysisResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .build()
            .map_err(|e| AnalysisError::Oracle(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = governor::RateLimiter::direct(governor::Quota::per_second(per_second));

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            timeout,
            rate_limiter,
        })
    }

    /// Create a client, resolving the API key (ENV → TOML)
    pub fn from_config(config: &OracleConfig) -> AnalysisResult<Self> {
        let api_key = resolve_oracle_api_key(config)?;
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Build the chat-completions request body
pub(crate) fn build_request_body(model: &str, request: &OracleRequest<'_>) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "messages": [
            { "role": "system", "content": request.instructions },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": format!("image_id: {}", request.image_id) },
                    { "type": "image_url", "image_url": { "url": request.image.to_oracle_url() } }
                ]
            }
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": request.schema_name,
                "strict": true,
                "schema": request.schema
            }
        }
    })
}

/// Pull the JSON document out of a chat-completions response body
pub(crate) fn parse_completion(body: Value) -> AnalysisResult<Value> {
    let response: ChatCompletionResponse = serde_json::from_value(body)
        .map_err(|e| AnalysisError::MalformedOutput(format!("Unexpected response shape: {}", e)))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| AnalysisError::MalformedOutput("Response has no choices".to_string()))?;

    if let Some(refusal) = message.refusal {
        return Err(AnalysisError::MalformedOutput(format!("Oracle refused: {}", refusal)));
    }

    let content = message
        .content
        .ok_or_else(|| AnalysisError::MalformedOutput("Response message has no content".to_string()))?;

    serde_json::from_str(&content)
        .map_err(|e| AnalysisError::MalformedOutput(format!("Content is not JSON: {}", e)))
}

#[async_trait]
impl VisionOracle for HttpVisionOracle {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn acquire_permit(&self) {
        self.rate_limiter.until_ready().await;
    }

    async fn complete_json(&self, request: &OracleRequest<'_>) -> AnalysisResult<Value> {
        debug!(
            image_id = %request.image_id,
            schema = request.schema_name,
            model = %self.model,
            "Querying vision oracle"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&build_request_body(&self.model, request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout(self.timeout)
                } else {
                    AnalysisError::Oracle(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Oracle(format!(
                "Oracle returned error status {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Timeout(self.timeout)
            } else {
                AnalysisError::MalformedOutput(format!("Response body is not JSON: {}", e))
            }
        })?;

        parse_completion(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageSource;

    #[test]
    fn test_endpoint_trailing_slash() {
        let config = OracleConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..OracleConfig::default()
        };
        let oracle = HttpVisionOracle::new(&config, "key".to_string()).unwrap();
        assert_eq!(oracle.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(oracle.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_request_body_shape() {
        let schema = json!({ "type": "object" });
        let request = OracleRequest {
            image_id: "img-3",
            image: ImageSource::Inline {
                data: "AAAA",
                mime_type: "image/png",
            },
            instructions: "Read the label.",
            schema_name: "per_image_extraction",
            schema: &schema,
        };
        let body = build_request_body("gpt-4o", &request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["content"], "Read the label.");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_parse_completion_content() {
        let body = json!({
            "choices": [{ "message": { "content": "{\"image_type\":\"label\"}" } }]
        });
        let value = parse_completion(body).unwrap();
        assert_eq!(value["image_type"], "label");
    }

    #[test]
    fn test_parse_completion_rejects_prose() {
        let body = json!({
            "choices": [{ "message": { "content": "This looks like a label." } }]
        });
        assert!(matches!(
            parse_completion(body),
            Err(AnalysisError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_parse_completion_refusal() {
        let body = json!({
            "choices": [{ "message": { "content": null, "refusal": "cannot help" } }]
        });
        assert!(matches!(
            parse_completion(body),
            Err(AnalysisError::MalformedOutput(_))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_config_requires_api_key() {
        std::env::remove_var(gemlens_common::config::ORACLE_API_KEY_ENV_VAR);
        let config = OracleConfig::default();
        match HttpVisionOracle::from_config(&config) {
            Err(AnalysisError::Common(gemlens_common::Error::Config(_))) => {}
            Err(other) => panic!("expected missing key error, got {}", other),
            Ok(_) => panic!("expected missing key error"),
        }

        std::env::set_var(gemlens_common::config::ORACLE_API_KEY_ENV_VAR, "sk-test");
        let oracle = HttpVisionOracle::from_config(&config).unwrap();
        assert_eq!(oracle.endpoint(), "https://api.openai.com/v1/chat/completions");
        std::env::remove_var(gemlens_common::config::ORACLE_API_KEY_ENV_VAR);
    }
}

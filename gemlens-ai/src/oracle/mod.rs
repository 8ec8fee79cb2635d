//! Recognition Oracle - injected vision capability
//!
//! The classifier and the category extractors only need one thing from the
//! outside world: "look at this image under these instructions and answer
//! with JSON matching this schema". `VisionOracle` is that seam. Parsing and
//! validating the answer stays on our side, so a mock oracle returning canned
//! JSON exercises the full classification/extraction path.

pub mod http;

use crate::error::{AnalysisError, AnalysisResult};
use crate::image::ImageSource;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub use http::HttpVisionOracle;

/// One oracle call
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub image_id: &'a str,
    pub image: ImageSource<'a>,
    /// System instructions for this call
    pub instructions: &'a str,
    pub schema_name: &'static str,
    /// Strict JSON schema the answer must follow
    pub schema: &'a Value,
}

/// Vision oracle trait - all oracle backends implement this
#[async_trait]
pub trait VisionOracle: Send + Sync {
    /// Backend identifier for logging (e.g., "openai-compatible")
    fn name(&self) -> &'static str;

    /// Wait until the backend's rate limit admits another call
    ///
    /// Awaited before the timeout window opens, so queueing behind the
    /// limiter never counts against the per-call timeout.
    async fn acquire_permit(&self) {}

    /// Ask the oracle about one image and return its JSON answer
    ///
    /// # Returns
    /// * `Ok(Value)` - The parsed JSON document (not yet validated)
    /// * `Err(Oracle)` - Transport or HTTP failure
    /// * `Err(MalformedOutput)` - Answer was not a JSON document
    async fn complete_json(&self, request: &OracleRequest<'_>) -> AnalysisResult<Value>;
}

/// Run an oracle call under a hard time bound
///
/// The bound covers the call itself, not the wait for a rate-limit permit.
pub async fn call_with_timeout(
    oracle: &dyn VisionOracle,
    request: &OracleRequest<'_>,
    timeout: Duration,
) -> AnalysisResult<Value> {
    oracle.acquire_permit().await;
    match tokio::time::timeout(timeout, oracle.complete_json(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                oracle = oracle.name(),
                image_id = %request.image_id,
                schema = request.schema_name,
                "Oracle call exceeded {:?}",
                timeout
            );
            Err(AnalysisError::Timeout(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SlowOracle;

    #[async_trait]
    impl VisionOracle for SlowOracle {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn complete_json(&self, _request: &OracleRequest<'_>) -> AnalysisResult<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({}))
        }
    }

    /// Queues behind a limiter, then answers at once
    struct ThrottledOracle;

    #[async_trait]
    impl VisionOracle for ThrottledOracle {
        fn name(&self) -> &'static str {
            "throttled"
        }

        async fn acquire_permit(&self) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        async fn complete_json(&self, _request: &OracleRequest<'_>) -> AnalysisResult<Value> {
            Ok(json!({ "ok": true }))
        }
    }

    fn request(schema: &Value) -> OracleRequest<'_> {
        OracleRequest {
            image_id: "img-1",
            image: ImageSource::Url("https://example.com/a.jpg"),
            instructions: "classify",
            schema_name: "test",
            schema,
        }
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let schema = json!({});
        let result = call_with_timeout(&SlowOracle, &request(&schema), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(AnalysisError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_permit_wait_not_counted_against_timeout() {
        let schema = json!({});
        let result =
            call_with_timeout(&ThrottledOracle, &request(&schema), Duration::from_millis(50)).await;
        assert_eq!(result.unwrap(), json!({ "ok": true }));
    }
}

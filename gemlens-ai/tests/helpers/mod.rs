//! Test Helper Utilities
//!
//! Shared utilities for testing gemlens-ai: a scripted vision oracle and
//! JSON builders for oracle answers.

#![allow(dead_code)]

use async_trait::async_trait;
use gemlens_ai::error::{AnalysisError, AnalysisResult};
use gemlens_ai::oracle::{OracleRequest, VisionOracle};
use gemlens_ai::schema::json_schema::{CLASSIFICATION_SCHEMA_NAME, EXTRACTION_SCHEMA_NAME};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What the mock oracle does for one (image, stage) pair
#[derive(Debug, Clone)]
pub enum Scripted {
    Answer(Value),
    /// Answer after sleeping
    Slow(Duration, Value),
    /// Transport failure
    Fail(String),
}

/// Vision oracle returning canned answers keyed by image id and schema name
#[derive(Default)]
pub struct MockOracle {
    script: HashMap<(String, &'static str), Scripted>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classification(mut self, image_id: &str, answer: Scripted) -> Self {
        self.script
            .insert((image_id.to_string(), CLASSIFICATION_SCHEMA_NAME), answer);
        self
    }

    pub fn extraction(mut self, image_id: &str, answer: Scripted) -> Self {
        self.script
            .insert((image_id.to_string(), EXTRACTION_SCHEMA_NAME), answer);
        self
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<(String, &'static str)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn extraction_calls(&self, image_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(id, schema)| id == image_id && *schema == EXTRACTION_SCHEMA_NAME)
            .count()
    }
}

#[async_trait]
impl VisionOracle for MockOracle {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete_json(&self, request: &OracleRequest<'_>) -> AnalysisResult<Value> {
        let key = (request.image_id.to_string(), request.schema_name);
        self.calls.lock().unwrap().push(key.clone());

        match self.script.get(&key).cloned() {
            Some(Scripted::Answer(value)) => Ok(value),
            Some(Scripted::Slow(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Scripted::Fail(message)) => Err(AnalysisError::Oracle(message)),
            None => Err(AnalysisError::Oracle(format!(
                "no scripted answer for {} / {}",
                key.0, key.1
            ))),
        }
    }
}

/// Classification answer
pub fn classified(image_id: &str, image_type: &str, confidence: f64) -> Scripted {
    Scripted::Answer(json!({
        "image_id": image_id,
        "image_type": image_type,
        "confidence": confidence,
        "reason": format!("looks like {}", image_type),
    }))
}

/// One raw claim as the oracle would emit it
pub fn raw_claim(field: &str, value: Value, confidence: f64, method: &str, raw: Option<&str>) -> Value {
    json!({
        "field": field,
        "value": value,
        "confidence": confidence,
        "provenance": { "method": method, "bbox": null, "raw": raw },
    })
}

/// Extraction answer
pub fn extracted(image_id: &str, image_type: &str, claims: Vec<Value>) -> Scripted {
    Scripted::Answer(json!({
        "image_id": image_id,
        "image_type": image_type,
        "claims": claims,
    }))
}

/// Install a test-friendly tracing subscriber (idempotent)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("gemlens_ai=debug")
        .try_init();
}

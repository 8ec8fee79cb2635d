//! Oracle output validation
//!
//! Oracle responses arrive as untyped JSON. This module turns them into the
//! typed contracts, applying two rules:
//! - Structurally incomplete claims (no field, no provenance, no value, bad
//!   confidence or bbox) are dropped and logged.
//! - Claims outside the closed vocabularies (unknown field, unknown method,
//!   extra keys) fail the whole extraction with `Validation` in strict mode,
//!   and are dropped in lenient mode.

use super::{
    BoundingBox, Claim, ClaimField, ClaimValue, Classification, ImageType, PerImageExtraction,
    Provenance, ProvenanceMethod,
};
use crate::error::{AnalysisError, AnalysisResult};
use gemlens_common::config::ExtractionSection;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const CLAIM_KEYS: [&str; 4] = ["field", "value", "confidence", "provenance"];
const PROVENANCE_KEYS: [&str; 3] = ["method", "bbox", "raw"];

/// How strictly the closed vocabularies are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub strict_vocabulary: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            strict_vocabulary: true,
        }
    }
}

impl From<&ExtractionSection> for ValidationPolicy {
    fn from(section: &ExtractionSection) -> Self {
        Self {
            strict_vocabulary: section.strict_vocabulary,
        }
    }
}

/// Why a raw claim did not make it through
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Incomplete or out-of-range; always dropped
    Incomplete(String),
    /// Outside the closed vocabularies; fatal in strict mode
    Vocabulary(String),
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    image_id: String,
    image_type: String,
    confidence: f64,
    reason: String,
}

/// Parse a classification response
///
/// Any deviation from `{ image_id, image_type, confidence, reason }` is
/// `MalformedOutput`. The requested image id always wins over the echoed one.
pub fn parse_classification(value: &Value, image_id: &str) -> AnalysisResult<Classification> {
    let raw: RawClassification = serde_json::from_value(value.clone()).map_err(|e| {
        AnalysisError::MalformedOutput(format!("classification for '{}': {}", image_id, e))
    })?;

    let image_type: ImageType = raw.image_type.parse().map_err(|e| {
        AnalysisError::MalformedOutput(format!("classification for '{}': {}", image_id, e))
    })?;

    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(AnalysisError::MalformedOutput(format!(
            "classification for '{}': confidence {} outside [0, 1]",
            image_id, raw.confidence
        )));
    }

    if raw.image_id != image_id {
        warn!(
            image_id = %image_id,
            echoed = %raw.image_id,
            "Oracle echoed a different image id, keeping the requested one"
        );
    }

    Ok(Classification {
        image_id: image_id.to_string(),
        image_type,
        confidence: raw.confidence,
        reason: raw.reason,
    })
}

/// Parse an extraction response for an image of a known category
pub fn parse_extraction(
    value: &Value,
    image_id: &str,
    image_type: ImageType,
    policy: ValidationPolicy,
) -> AnalysisResult<PerImageExtraction> {
    let object = value.as_object().ok_or_else(|| {
        AnalysisError::MalformedOutput(format!("extraction for '{}' is not an object", image_id))
    })?;

    let raw_claims = object
        .get("claims")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AnalysisError::MalformedOutput(format!(
                "extraction for '{}' has no claims array",
                image_id
            ))
        })?;

    if let Some(echoed) = object.get("image_type").and_then(Value::as_str) {
        match echoed.parse::<ImageType>() {
            Ok(t) if t != image_type => warn!(
                image_id = %image_id,
                requested = %image_type,
                echoed = %t,
                "Oracle echoed a different image type, keeping the requested one"
            ),
            Ok(_) => {}
            Err(e) if policy.strict_vocabulary => {
                return Err(AnalysisError::Validation(format!("'{}': {}", image_id, e)))
            }
            Err(e) => warn!(image_id = %image_id, "Ignoring echoed image type: {}", e),
        }
    }

    let mut claims = Vec::with_capacity(raw_claims.len());
    for (index, raw) in raw_claims.iter().enumerate() {
        match validate_claim(raw) {
            Ok(claim) => claims.push(claim),
            Err(Rejection::Incomplete(reason)) => {
                warn!(image_id = %image_id, index, "Dropping claim: {}", reason);
            }
            Err(Rejection::Vocabulary(reason)) if policy.strict_vocabulary => {
                return Err(AnalysisError::Validation(format!(
                    "'{}' claim {}: {}",
                    image_id, index, reason
                )));
            }
            Err(Rejection::Vocabulary(reason)) => {
                warn!(image_id = %image_id, index, "Dropping out-of-vocabulary claim: {}", reason);
            }
        }
    }

    debug!(
        image_id = %image_id,
        kept = claims.len(),
        received = raw_claims.len(),
        "Extraction validated"
    );

    Ok(PerImageExtraction {
        image_id: image_id.to_string(),
        image_type,
        claims,
    })
}

/// Validate one raw claim object
pub fn validate_claim(raw: &Value) -> Result<Claim, Rejection> {
    let object = raw
        .as_object()
        .ok_or_else(|| Rejection::Incomplete("claim is not an object".to_string()))?;

    reject_extra_keys(object, &CLAIM_KEYS, "claim")?;

    let field_name = object
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| Rejection::Incomplete("missing field".to_string()))?;
    let field: ClaimField = field_name.parse().map_err(Rejection::Vocabulary)?;

    let provenance = object
        .get("provenance")
        .and_then(Value::as_object)
        .ok_or_else(|| Rejection::Incomplete(format!("{}: missing provenance", field)))?;
    let provenance = validate_provenance(provenance, field)?;

    let value = match object.get("value") {
        None | Some(Value::Null) => {
            return Err(Rejection::Incomplete(format!("{}: no value", field)));
        }
        Some(v) => serde_json::from_value::<ClaimValue>(v.clone())
            .map_err(|_| Rejection::Incomplete(format!("{}: value is not a scalar", field)))?,
    };

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| Rejection::Incomplete(format!("{}: missing confidence", field)))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(Rejection::Incomplete(format!(
            "{}: confidence {} outside [0, 1]",
            field, confidence
        )));
    }

    Ok(Claim {
        field,
        value: Some(value),
        confidence,
        provenance,
    })
}

fn validate_provenance(
    object: &Map<String, Value>,
    field: ClaimField,
) -> Result<Provenance, Rejection> {
    reject_extra_keys(object, &PROVENANCE_KEYS, "provenance")?;

    let method_name = object
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| Rejection::Incomplete(format!("{}: provenance without method", field)))?;
    let method: ProvenanceMethod = method_name.parse().map_err(Rejection::Vocabulary)?;

    let bbox = match object.get("bbox") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<BoundingBox>(v.clone())
                .map_err(|_| Rejection::Incomplete(format!("{}: bbox must hold 4 numbers", field)))?,
        ),
    };

    let raw = match object.get("raw") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(Rejection::Incomplete(format!("{}: raw must be text", field)));
        }
    };

    Ok(Provenance { method, bbox, raw })
}

fn reject_extra_keys(
    object: &Map<String, Value>,
    allowed: &[&str],
    what: &str,
) -> Result<(), Rejection> {
    match object.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(extra) => Err(Rejection::Vocabulary(format!(
            "unexpected {} key '{}'",
            what, extra
        ))),
        None => Ok(()),
    }
}

//! Strict JSON schemas handed to the recognition oracle
//!
//! Enumerations are generated from the Rust vocabularies so the oracle's
//! constraint and the validator can never drift apart.

use super::{ClaimField, ImageType, ProvenanceMethod};
use serde_json::{json, Value};

/// Schema name for classification responses
pub const CLASSIFICATION_SCHEMA_NAME: &str = "image_classification";

/// Schema name for extraction responses
pub const EXTRACTION_SCHEMA_NAME: &str = "per_image_extraction";

fn image_type_names() -> Vec<&'static str> {
    ImageType::ALL.iter().map(|t| t.as_str()).collect()
}

/// `{ image_id, image_type, confidence, reason }`
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["image_id", "image_type", "confidence", "reason"],
        "properties": {
            "image_id": { "type": "string" },
            "image_type": { "type": "string", "enum": image_type_names() },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "reason": { "type": "string" }
        }
    })
}

/// `{ image_id, image_type, claims: [{ field, value, confidence, provenance }] }`
pub fn extraction_schema() -> Value {
    let fields: Vec<&str> = ClaimField::ALL.iter().map(|f| f.as_str()).collect();
    let methods: Vec<&str> = ProvenanceMethod::ALL.iter().map(|m| m.as_str()).collect();

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["image_id", "image_type", "claims"],
        "properties": {
            "image_id": { "type": "string" },
            "image_type": { "type": "string", "enum": image_type_names() },
            "claims": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["field", "value", "confidence", "provenance"],
                    "properties": {
                        "field": { "type": "string", "enum": fields },
                        "value": { "type": ["string", "number", "boolean", "null"] },
                        "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                        "provenance": {
                            "type": "object",
                            "additionalProperties": false,
                            "required": ["method", "bbox", "raw"],
                            "properties": {
                                "method": { "type": "string", "enum": methods },
                                "bbox": {
                                    "type": ["array", "null"],
                                    "items": { "type": "number" },
                                    "minItems": 4,
                                    "maxItems": 4
                                },
                                "raw": { "type": ["string", "null"] }
                            }
                        }
                    }
                }
            }
        }
    })
}

//! Fused record shapes
//!
//! `FinalRecord` and `ConfidenceRecord` share one layout through the generic
//! group structs, so every resolved value has a confidence at the same path.
//! All containers are ordered; serializing the same record twice yields the
//! same bytes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions<T> {
    pub max: T,
    pub min: T,
    pub height: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cut<T> {
    pub shape: T,
    pub style: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Color<T> {
    pub family: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fluorescence<T> {
    pub intensity: T,
    pub color: T,
}

/// Best-estimate attribute values for one gemstone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    pub dimensions_mm: Dimensions<Option<f64>>,
    pub weight_ct: Option<f64>,
    pub cut: Cut<Option<String>>,
    pub color: Color<Option<String>>,
    pub clarity_est: Option<String>,
    pub fluorescence: Fluorescence<Option<String>>,
    pub treatment_signs: Option<String>,
}

/// Strength of evidence behind each resolved value (0.0 when unresolved)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    pub dimensions_mm: Dimensions<f64>,
    pub weight_ct: f64,
    pub cut: Cut<f64>,
    pub color: Color<f64>,
    pub clarity_est: f64,
    pub fluorescence: Fluorescence<f64>,
    pub treatment_signs: f64,
}

/// Deduplicated `"{image_id}:{method}"` entries per attribute group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceGroups {
    pub dimensions: Vec<String>,
    pub weight: Vec<String>,
    pub label: Vec<String>,
}

/// One gemstone's fused record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    #[serde(rename = "final")]
    pub resolved: FinalRecord,
    pub confidence: ConfidenceRecord,
    pub provenance: ProvenanceGroups,
    pub conflicts: Vec<String>,
    pub needs_review: bool,
}

//! Claim Schema - canonical vocabulary and data contracts
//!
//! Contracts between the three stages:
//! - Classifier → `Classification`
//! - Category extractor → `PerImageExtraction` (a list of `Claim`s)
//! - Fusion engine → `FusionResult`
//!
//! Claim fields and provenance methods are closed vocabularies. Anything the
//! oracle emits outside them is caught in `validation` before it reaches fusion.

pub mod json_schema;
pub mod record;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use record::{
    Color, ConfidenceRecord, Cut, Dimensions, FinalRecord, Fluorescence, FusionResult,
    ProvenanceGroups,
};

/// Fusion weight / oracle confidence (0.0-1.0)
pub type Confidence = f64;

// ============================================================================
// Closed vocabularies
// ============================================================================

/// Attribute a claim speaks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimField {
    DimensionMmMax,
    DimensionMmMin,
    DimensionMmHeight,
    WeightCt,
    /// Instrument reading whose orientation could not be decided
    InstrumentReadoutMm,
    /// Display range of the measuring instrument (e.g. "0-25 mm")
    InstrumentRange,
    CutShape,
    CutStyle,
    ColorFamily,
    ClarityEst,
    FluorescenceIntensity,
    FluorescenceColor,
    TreatmentSigns,
    LabelText,
    Notes,
}

impl ClaimField {
    pub const ALL: [ClaimField; 15] = [
        ClaimField::DimensionMmMax,
        ClaimField::DimensionMmMin,
        ClaimField::DimensionMmHeight,
        ClaimField::WeightCt,
        ClaimField::InstrumentReadoutMm,
        ClaimField::InstrumentRange,
        ClaimField::CutShape,
        ClaimField::CutStyle,
        ClaimField::ColorFamily,
        ClaimField::ClarityEst,
        ClaimField::FluorescenceIntensity,
        ClaimField::FluorescenceColor,
        ClaimField::TreatmentSigns,
        ClaimField::LabelText,
        ClaimField::Notes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimField::DimensionMmMax => "dimension_mm_max",
            ClaimField::DimensionMmMin => "dimension_mm_min",
            ClaimField::DimensionMmHeight => "dimension_mm_height",
            ClaimField::WeightCt => "weight_ct",
            ClaimField::InstrumentReadoutMm => "instrument_readout_mm",
            ClaimField::InstrumentRange => "instrument_range",
            ClaimField::CutShape => "cut_shape",
            ClaimField::CutStyle => "cut_style",
            ClaimField::ColorFamily => "color_family",
            ClaimField::ClarityEst => "clarity_est",
            ClaimField::FluorescenceIntensity => "fluorescence_intensity",
            ClaimField::FluorescenceColor => "fluorescence_color",
            ClaimField::TreatmentSigns => "treatment_signs",
            ClaimField::LabelText => "label_text",
            ClaimField::Notes => "notes",
        }
    }

    /// Fields whose values are millimetre lengths
    pub fn is_dimension(self) -> bool {
        matches!(
            self,
            ClaimField::DimensionMmMax
                | ClaimField::DimensionMmMin
                | ClaimField::DimensionMmHeight
                | ClaimField::InstrumentReadoutMm
        )
    }

    /// Fields carrying a number rather than a label or free text
    pub fn is_numeric(self) -> bool {
        self.is_dimension() || self == ClaimField::WeightCt
    }
}

impl fmt::Display for ClaimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown claim field '{}'", s))
    }
}

/// How a claim's value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceMethod {
    LcdOcr,
    ScaleDetection,
    LabelOcr,
    VisualInference,
    TextParsing,
    GeometricEstimate,
}

impl ProvenanceMethod {
    pub const ALL: [ProvenanceMethod; 6] = [
        ProvenanceMethod::LcdOcr,
        ProvenanceMethod::ScaleDetection,
        ProvenanceMethod::LabelOcr,
        ProvenanceMethod::VisualInference,
        ProvenanceMethod::TextParsing,
        ProvenanceMethod::GeometricEstimate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProvenanceMethod::LcdOcr => "lcd_ocr",
            ProvenanceMethod::ScaleDetection => "scale_detection",
            ProvenanceMethod::LabelOcr => "label_ocr",
            ProvenanceMethod::VisualInference => "visual_inference",
            ProvenanceMethod::TextParsing => "text_parsing",
            ProvenanceMethod::GeometricEstimate => "geometric_estimate",
        }
    }
}

impl fmt::Display for ProvenanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvenanceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProvenanceMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown provenance method '{}'", s))
    }
}

/// Image category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Instrument,
    Label,
    GemMacro,
    Unknown,
}

impl ImageType {
    pub const ALL: [ImageType; 4] = [
        ImageType::Instrument,
        ImageType::Label,
        ImageType::GemMacro,
        ImageType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Instrument => "instrument",
            ImageType::Label => "label",
            ImageType::GemMacro => "gem_macro",
            ImageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown image type '{}'", s))
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claim value as emitted by the oracle
///
/// `null` is represented by `Option::None` on the claim, never by a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ClaimValue {
    /// Numeric reading of the value
    ///
    /// Accepts numeric strings with either decimal separator ("6,45" → 6.45).
    /// Non-finite numbers read as `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            ClaimValue::Number(n) => *n,
            ClaimValue::Text(s) => normalize_decimal(s.trim()).parse::<f64>().ok()?,
            ClaimValue::Bool(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Label reading of the value (trimmed, empty strings read as `None`)
    pub fn as_label(&self) -> Option<String> {
        match self {
            ClaimValue::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            ClaimValue::Bool(b) => Some(b.to_string()),
            ClaimValue::Number(n) if n.is_finite() => Some(n.to_string()),
            ClaimValue::Number(_) => None,
        }
    }
}

/// Replace a single decimal comma between digits with a point
///
/// "1,25" → "1.25"; runs with several commas ("1,250,000") are left alone.
pub fn normalize_decimal(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_ascii_digit()
            && chars[i + 1].is_ascii_digit();
        if c == ',' && between_digits && commas_in_number_run(&chars, i) == 1 {
            out.push('.');
        } else {
            out.push(c);
        }
    }
    out
}

/// Count commas in the contiguous digit/comma run around position `i`
fn commas_in_number_run(chars: &[char], i: usize) -> usize {
    let in_run = |c: &char| c.is_ascii_digit() || *c == ',';
    let start = chars[..i]
        .iter()
        .rposition(|c| !in_run(c))
        .map_or(0, |p| p + 1);
    let end = chars[i..]
        .iter()
        .position(|c| !in_run(c))
        .map_or(chars.len(), |p| i + p);
    chars[start..end].iter().filter(|c| **c == ',').count()
}

/// Pixel region `[x, y, width, height]`
pub type BoundingBox = [f64; 4];

/// How a claim's value was derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub method: ProvenanceMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    /// Original text or readout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Provenance {
    pub fn new(method: ProvenanceMethod) -> Self {
        Self {
            method,
            bbox: None,
            raw: None,
        }
    }
}

/// A single typed, confidence-scored assertion derived from one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub field: ClaimField,

    #[serde(default)]
    pub value: Option<ClaimValue>,

    /// Fusion weight (0.0-1.0)
    pub confidence: Confidence,

    pub provenance: Provenance,
}

impl Claim {
    /// Claim with a value and bare provenance
    pub fn new(
        field: ClaimField,
        value: ClaimValue,
        confidence: Confidence,
        method: ProvenanceMethod,
    ) -> Self {
        Self {
            field,
            value: Some(value),
            confidence,
            provenance: Provenance::new(method),
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.provenance.raw = Some(raw.into());
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.provenance.bbox = Some(bbox);
        self
    }
}

/// One image's claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerImageExtraction {
    pub image_id: String,
    pub image_type: ImageType,
    pub claims: Vec<Claim>,
}

impl PerImageExtraction {
    /// Extraction carrying no claims (e.g. an `unknown` image)
    pub fn empty(image_id: impl Into<String>, image_type: ImageType) -> Self {
        Self {
            image_id: image_id.into(),
            image_type,
            claims: Vec::new(),
        }
    }
}

/// Classifier output for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub image_id: String,
    pub image_type: ImageType,
    pub confidence: Confidence,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_match_serde() {
        for field in ClaimField::ALL {
            let json = serde_json::to_value(field).unwrap();
            assert_eq!(json, serde_json::Value::String(field.as_str().to_string()));
            assert_eq!(field.as_str().parse::<ClaimField>().unwrap(), field);
        }
    }

    #[test]
    fn test_method_names_match_serde() {
        for method in ProvenanceMethod::ALL {
            let json = serde_json::to_value(method).unwrap();
            assert_eq!(json, serde_json::Value::String(method.as_str().to_string()));
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!("carat_weight".parse::<ClaimField>().is_err());
        assert!(serde_json::from_str::<ClaimField>("\"carat_weight\"").is_err());
    }

    #[test]
    fn test_claim_value_untagged() {
        let v: ClaimValue = serde_json::from_str("6.45").unwrap();
        assert_eq!(v, ClaimValue::Number(6.45));
        let v: ClaimValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, ClaimValue::Bool(true));
        let v: ClaimValue = serde_json::from_str("\"oval\"").unwrap();
        assert_eq!(v, ClaimValue::Text("oval".into()));
    }

    #[test]
    fn test_as_number_accepts_decimal_comma() {
        assert_eq!(ClaimValue::Text("1,25".into()).as_number(), Some(1.25));
        assert_eq!(ClaimValue::Text(" 6.10 ".into()).as_number(), Some(6.10));
        assert_eq!(ClaimValue::Text("oval".into()).as_number(), None);
        assert_eq!(ClaimValue::Bool(true).as_number(), None);
        assert_eq!(ClaimValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn test_normalize_decimal() {
        assert_eq!(normalize_decimal("0,92 ct"), "0.92 ct");
        assert_eq!(normalize_decimal("6,1 x 4,2 mm"), "6.1 x 4.2 mm");
        assert_eq!(normalize_decimal("1,250,000"), "1,250,000");
        assert_eq!(normalize_decimal("red, oval"), "red, oval");
    }

    #[test]
    fn test_claim_null_value_deserializes_as_none() {
        let claim: Claim = serde_json::from_str(
            r#"{"field":"weight_ct","value":null,"confidence":0.5,"provenance":{"method":"label_ocr"}}"#,
        )
        .unwrap();
        assert!(claim.value.is_none());
        assert!(claim.provenance.bbox.is_none());
    }
}

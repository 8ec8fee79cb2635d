// Fusion Engine - Cross-Image Claim Reconciliation
//
// Pure function over the per-image extractions of one gemstone:
// - Numeric fields: confidence-weighted mean, max weight as confidence,
//   range-vs-tolerance conflict detection
// - Categorical fields: highest-confidence claim wins
// - Provenance: deduplicated "{image_id}:{method}" per attribute group
// - Review flag: any conflict, or weak weight/height evidence
//
// No I/O, no clocks, no hash-ordered containers: same input, same bytes out.

pub mod categorical;
pub mod numeric;
pub mod provenance;

use crate::schema::{
    Claim, ClaimField, Color, ConfidenceRecord, Cut, Dimensions, FinalRecord, Fluorescence,
    FusionResult, PerImageExtraction,
};
use gemlens_common::config::FusionSection;
use tracing::{debug, info};

use categorical::resolve_categorical;
use numeric::{resolve_numeric, NumericResolution};
use provenance::ProvenanceCollector;

/// Tolerances and review threshold passed into every fusion call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Largest acceptable spread between dimension readings (mm)
    pub dimension_tolerance_mm: f64,
    /// Largest acceptable spread between weight readings (ct)
    pub weight_tolerance_ct: f64,
    /// Weight or height confidence below this flags the record for review
    pub min_confidence_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionSection::default().into()
    }
}

impl From<FusionSection> for FusionConfig {
    fn from(section: FusionSection) -> Self {
        Self {
            dimension_tolerance_mm: section.dimension_tolerance_mm,
            weight_tolerance_ct: section.weight_tolerance_ct,
            min_confidence_threshold: section.min_confidence_threshold,
        }
    }
}

/// A claim together with the image it came from
#[derive(Debug, Clone, Copy)]
pub struct SourcedClaim<'a> {
    pub image_id: &'a str,
    pub claim: &'a Claim,
}

/// All claims for `field`, in input order (image order, then claim order)
pub fn claims_for<'a>(
    extractions: &'a [PerImageExtraction],
    field: ClaimField,
) -> Vec<SourcedClaim<'a>> {
    extractions
        .iter()
        .flat_map(|extraction| {
            extraction
                .claims
                .iter()
                .filter(move |claim| claim.field == field)
                .map(move |claim| SourcedClaim {
                    image_id: &extraction.image_id,
                    claim,
                })
        })
        .collect()
}

/// Fuse all per-image extractions of one gemstone into a single record
///
/// Total over any input, including the empty list (everything null,
/// confidence 0, `needs_review = true`).
pub fn fuse(extractions: &[PerImageExtraction], config: &FusionConfig) -> FusionResult {
    debug!("Starting fusion with {} extractions", extractions.len());

    let mut conflicts = Vec::new();
    let mut provenance = ProvenanceCollector::default();

    let mut numeric = |field: ClaimField, tolerance: f64, unit: &str| {
        let claims = claims_for(extractions, field);
        let resolution: NumericResolution = resolve_numeric(&claims);
        if let Some(spread) = resolution.spread {
            if spread > tolerance {
                conflicts.push(format!(
                    "{}: readings span {:.3} {} across {} claims ({:.3} to {:.3}), exceeding tolerance {} {}",
                    field,
                    spread,
                    unit,
                    resolution.contributors.len(),
                    resolution.low.unwrap_or_default(),
                    resolution.high.unwrap_or_default(),
                    tolerance,
                    unit
                ));
            }
        }
        provenance.record_numeric(field, &resolution.contributors);
        resolution
    };

    // Numeric fields: height first, matching review priority
    let height = numeric(ClaimField::DimensionMmHeight, config.dimension_tolerance_mm, "mm");
    let min = numeric(ClaimField::DimensionMmMin, config.dimension_tolerance_mm, "mm");
    let max = numeric(ClaimField::DimensionMmMax, config.dimension_tolerance_mm, "mm");
    let weight = numeric(ClaimField::WeightCt, config.weight_tolerance_ct, "ct");

    // Categorical fields
    let categorical = |field: ClaimField| resolve_categorical(&claims_for(extractions, field));
    let cut_shape = categorical(ClaimField::CutShape);
    let cut_style = categorical(ClaimField::CutStyle);
    let color_family = categorical(ClaimField::ColorFamily);
    let clarity = categorical(ClaimField::ClarityEst);
    let fluorescence_intensity = categorical(ClaimField::FluorescenceIntensity);
    let fluorescence_color = categorical(ClaimField::FluorescenceColor);
    let treatment = categorical(ClaimField::TreatmentSigns);

    provenance.record_label(&claims_for(extractions, ClaimField::LabelText));

    let needs_review = !conflicts.is_empty()
        || weight.confidence < config.min_confidence_threshold
        || height.confidence < config.min_confidence_threshold;

    let resolved = FinalRecord {
        dimensions_mm: Dimensions {
            max: max.value,
            min: min.value,
            height: height.value,
        },
        weight_ct: weight.value,
        cut: Cut {
            shape: cut_shape.value.clone(),
            style: cut_style.value.clone(),
        },
        color: Color {
            family: color_family.value.clone(),
        },
        clarity_est: clarity.value.clone(),
        fluorescence: Fluorescence {
            intensity: fluorescence_intensity.value.clone(),
            color: fluorescence_color.value.clone(),
        },
        treatment_signs: treatment.value.clone(),
    };

    let confidence = ConfidenceRecord {
        dimensions_mm: Dimensions {
            max: max.confidence,
            min: min.confidence,
            height: height.confidence,
        },
        weight_ct: weight.confidence,
        cut: Cut {
            shape: cut_shape.confidence,
            style: cut_style.confidence,
        },
        color: Color {
            family: color_family.confidence,
        },
        clarity_est: clarity.confidence,
        fluorescence: Fluorescence {
            intensity: fluorescence_intensity.confidence,
            color: fluorescence_color.confidence,
        },
        treatment_signs: treatment.confidence,
    };

    info!(
        extractions = extractions.len(),
        conflicts = conflicts.len(),
        needs_review,
        weight_ct = ?resolved.weight_ct,
        height_mm = ?resolved.dimensions_mm.height,
        "Fusion complete"
    );

    FusionResult {
        resolved,
        confidence,
        provenance: provenance.finish(),
        conflicts,
        needs_review,
    }
}

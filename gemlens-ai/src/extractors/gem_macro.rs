// Gem-Macro Strategy
//
// Close-ups of the stone itself: shape, cutting style, colour family, a coarse
// clarity bucket, and visible fluorescence or treatment signs. Free-form
// observations only ever go into notes.

use super::ExtractionStrategy;
use crate::schema::{Claim, ClaimField, ClaimValue, ImageType, ProvenanceMethod};
use tracing::debug;

const GEM_MACRO_INSTRUCTIONS: &str = "\
Category: gem_macro (close-up of the stone itself).
- cut_shape: outline shape (round, oval, cushion, emerald, pear, marquise, heart, princess, radiant, asscher, trillion, baguette, cabochon).
- cut_style: faceting style (brilliant, step, mixed, rose, cabochon).
- color_family: one coarse hue word (e.g. red, pink, orange, yellow, green, blue, violet, purple, brown, black, white, colorless).
- clarity_est: exactly one of eye_clean, lightly_included, included.
- fluorescence_intensity / fluorescence_color: only if the photo is clearly taken under UV light.
- treatment_signs: only for visible evidence (e.g. flash effect, dye concentration in fractures, surface residue).
- Use method visual_inference for all judgements above.
- Dimensions only if a scale or ruler is visible in the frame, with method geometric_estimate.
- Any other observation goes into notes as free text, never into a typed field.";

/// Coarse clarity buckets
pub const CLARITY_BUCKETS: [&str; 3] = ["eye_clean", "lightly_included", "included"];

/// Extraction strategy for close-up photos of the stone
#[derive(Debug, Clone, Copy, Default)]
pub struct GemMacroStrategy;

impl ExtractionStrategy for GemMacroStrategy {
    fn category(&self) -> ImageType {
        ImageType::GemMacro
    }

    fn instructions(&self) -> &'static str {
        GEM_MACRO_INSTRUCTIONS
    }

    fn accepts(&self, field: ClaimField, method: ProvenanceMethod) -> bool {
        match field {
            ClaimField::Notes => true,
            ClaimField::DimensionMmMax | ClaimField::DimensionMmMin | ClaimField::DimensionMmHeight => {
                method == ProvenanceMethod::GeometricEstimate
            }
            ClaimField::CutShape
            | ClaimField::CutStyle
            | ClaimField::ColorFamily
            | ClaimField::ClarityEst
            | ClaimField::FluorescenceIntensity
            | ClaimField::FluorescenceColor
            | ClaimField::TreatmentSigns => method == ProvenanceMethod::VisualInference,
            _ => false,
        }
    }

    fn refine(&self, claims: Vec<Claim>) -> Vec<Claim> {
        claims.into_iter().filter_map(canonicalize_claim).collect()
    }
}

/// Lower-case, underscore-joined form of a label ("Lightly Included" → "lightly_included")
pub fn canonical_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Canonical label for categorical claims; clarity must land in a bucket
pub(super) fn canonicalize_claim(mut claim: Claim) -> Option<Claim> {
    if claim.field == ClaimField::Notes || claim.field.is_numeric() {
        return Some(claim);
    }

    let label = canonical_label(&claim.value.as_ref().and_then(ClaimValue::as_label)?);
    if label.is_empty() {
        return None;
    }

    if claim.field == ClaimField::ClarityEst && !CLARITY_BUCKETS.contains(&label.as_str()) {
        debug!(value = %label, "Dropping clarity estimate outside the three buckets");
        return None;
    }

    claim.value = Some(ClaimValue::Text(label));
    Some(claim)
}

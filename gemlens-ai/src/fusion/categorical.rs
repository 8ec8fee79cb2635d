// Categorical Field Resolution - Highest-Confidence Selection
//
// Labels have no meaningful mean, so no averaging and no voting: the single
// strongest claim wins. Ties keep the earliest claim in input order.

use super::SourcedClaim;
use crate::schema::ClaimValue;

/// Resolution of one categorical field
#[derive(Debug, Clone, Default)]
pub struct CategoricalResolution<'a> {
    pub value: Option<String>,
    pub confidence: f64,
    pub source: Option<SourcedClaim<'a>>,
}

/// Resolve one categorical field from its claims
pub fn resolve_categorical<'a>(claims: &[SourcedClaim<'a>]) -> CategoricalResolution<'a> {
    let mut best = CategoricalResolution::default();

    for claim in claims {
        let weight = claim.claim.confidence;
        if !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        let Some(label) = claim.claim.value.as_ref().and_then(ClaimValue::as_label) else {
            continue;
        };
        if best.source.is_none() || weight > best.confidence {
            best = CategoricalResolution {
                value: Some(label),
                confidence: weight,
                source: Some(*claim),
            };
        }
    }

    best
}

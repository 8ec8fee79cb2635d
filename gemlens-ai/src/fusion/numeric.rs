// Numeric Field Resolution - Confidence-Weighted Mean
//
// value      = Σ(value·weight) / Σ(weight) over claims with weight > 0
// confidence = max individual weight (one strong reading is not diluted by weak ones)
// spread     = max(value) − min(value), compared against tolerance by the caller

use super::SourcedClaim;
use crate::schema::ClaimValue;

/// Resolution of one numeric field
#[derive(Debug, Clone, Default)]
pub struct NumericResolution<'a> {
    pub value: Option<f64>,
    pub confidence: f64,
    /// max − min among contributors (`None` without contributors)
    pub spread: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    /// Claims that entered the mean, in input order
    pub contributors: Vec<SourcedClaim<'a>>,
}

/// Numeric reading and weight of a claim, if it may contribute
fn contribution(claim: &SourcedClaim<'_>) -> Option<(f64, f64)> {
    let weight = claim.claim.confidence;
    if !weight.is_finite() || weight <= 0.0 {
        return None;
    }
    let value = claim.claim.value.as_ref().and_then(ClaimValue::as_number)?;
    Some((value, weight))
}

/// Resolve one numeric field from its claims
pub fn resolve_numeric<'a>(claims: &[SourcedClaim<'a>]) -> NumericResolution<'a> {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut confidence: f64 = 0.0;
    let mut low: Option<f64> = None;
    let mut high: Option<f64> = None;
    let mut contributors = Vec::new();

    for claim in claims {
        let Some((value, weight)) = contribution(claim) else {
            continue;
        };
        weighted_sum += value * weight;
        weight_sum += weight;
        confidence = confidence.max(weight);
        low = Some(low.map_or(value, |l| l.min(value)));
        high = Some(high.map_or(value, |h| h.max(value)));
        contributors.push(*claim);
    }

    let value = (weight_sum > 0.0).then(|| weighted_sum / weight_sum);
    let spread = match (low, high) {
        (Some(l), Some(h)) => Some(h - l),
        _ => None,
    };

    NumericResolution {
        value,
        confidence,
        spread,
        low,
        high,
        contributors,
    }
}

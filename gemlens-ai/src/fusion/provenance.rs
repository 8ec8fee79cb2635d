// Provenance Groups
//
// "{image_id}:{method}" entries, deduplicated, in first-seen order, for the
// claims that actually contributed to dimensions and weight, plus every
// label_text claim.

use super::SourcedClaim;
use crate::schema::{ClaimField, ProvenanceGroups};

#[derive(Debug, Default)]
pub struct ProvenanceCollector {
    groups: ProvenanceGroups,
}

fn entry(claim: &SourcedClaim<'_>) -> String {
    format!("{}:{}", claim.image_id, claim.claim.provenance.method)
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl ProvenanceCollector {
    /// Record the contributors of a numeric field under its group
    pub fn record_numeric(&mut self, field: ClaimField, contributors: &[SourcedClaim<'_>]) {
        let list = match field {
            ClaimField::WeightCt => &mut self.groups.weight,
            f if f.is_dimension() => &mut self.groups.dimensions,
            _ => return,
        };
        for claim in contributors {
            push_unique(list, entry(claim));
        }
    }

    /// Record label-text claims
    pub fn record_label(&mut self, claims: &[SourcedClaim<'_>]) {
        for claim in claims {
            push_unique(&mut self.groups.label, entry(claim));
        }
    }

    pub fn finish(self) -> ProvenanceGroups {
        self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Claim, ClaimValue, ProvenanceMethod};

    #[test]
    fn test_deduplicates_same_image_and_method() {
        let a = Claim::new(ClaimField::DimensionMmMax, ClaimValue::Number(6.1), 0.9, ProvenanceMethod::LcdOcr);
        let b = Claim::new(ClaimField::DimensionMmMin, ClaimValue::Number(4.2), 0.9, ProvenanceMethod::LcdOcr);
        let mut collector = ProvenanceCollector::default();
        collector.record_numeric(ClaimField::DimensionMmMax, &[SourcedClaim { image_id: "img-1", claim: &a }]);
        collector.record_numeric(ClaimField::DimensionMmMin, &[SourcedClaim { image_id: "img-1", claim: &b }]);
        let groups = collector.finish();
        assert_eq!(groups.dimensions, vec!["img-1:lcd_ocr".to_string()]);
        assert!(groups.weight.is_empty());
    }
}

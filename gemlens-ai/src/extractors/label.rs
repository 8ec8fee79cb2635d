// Label Strategy
//
// Packaging tags, parcel papers, handwritten notes and invoices, possibly in
// non-Latin script. Labels are the main source of weight and of paired
// length/width dimensions; their cut keywords go through a controlled mapping.

use super::ExtractionStrategy;
use crate::schema::{normalize_decimal, Claim, ClaimField, ClaimValue, ImageType, ProvenanceMethod};
use tracing::debug;

const LABEL_INSTRUCTIONS: &str = "\
Category: label (packaging tag, parcel paper, handwritten note, invoice; any script).
- Recognize all text. Normalize decimal commas to points (\"0,92\" -> 0.92).
- Weight in carats (ct, cts, carat) -> weight_ct.
- Paired dimensions such as \"6.1 x 4.2 mm\" -> dimension_mm_max (larger) and dimension_mm_min (smaller); a third value after a second \"x\" -> dimension_mm_height.
- Cut or shape keywords (e.g. oval, OV, cushion, pear, 椭圆) -> cut_shape, with the keyword as written in provenance.raw.
- Colour, clarity, fluorescence or treatment statements written on the label may be recorded with method text_parsing.
- Always record the cleaned full text as label_text (method label_ocr).
- Use label_ocr for values read directly and text_parsing for values derived by interpreting the text.";

/// Controlled cut-shape vocabulary: keyword as written → canonical shape
const CUT_KEYWORDS: &[(&str, &str)] = &[
    ("round", "round"),
    ("rd", "round"),
    ("rnd", "round"),
    ("brilliant", "round"),
    ("oval", "oval"),
    ("ov", "oval"),
    ("cushion", "cushion"),
    ("cush", "cushion"),
    ("cu", "cushion"),
    ("emerald", "emerald"),
    ("em", "emerald"),
    ("octagon", "emerald"),
    ("oct", "emerald"),
    ("pear", "pear"),
    ("ps", "pear"),
    ("drop", "pear"),
    ("marquise", "marquise"),
    ("mq", "marquise"),
    ("navette", "marquise"),
    ("heart", "heart"),
    ("ht", "heart"),
    ("princess", "princess"),
    ("pr", "princess"),
    ("radiant", "radiant"),
    ("rad", "radiant"),
    ("asscher", "asscher"),
    ("trillion", "trillion"),
    ("trilliant", "trillion"),
    ("triangle", "trillion"),
    ("baguette", "baguette"),
    ("bag", "baguette"),
    ("cabochon", "cabochon"),
    ("cab", "cabochon"),
    ("椭圆", "oval"),
    ("圆形", "round"),
    ("垫形", "cushion"),
    ("祖母绿", "emerald"),
    ("梨形", "pear"),
    ("水滴", "pear"),
    ("马眼", "marquise"),
    ("心形", "heart"),
    ("公主方", "princess"),
    ("弧面", "cabochon"),
];

/// Shortest keyword eligible for near-miss matching
const FUZZY_MIN_LEN: usize = 5;

/// Map label text to a canonical cut shape
///
/// Exact keyword, then word-by-word, then substring for non-Latin keywords,
/// then one-edit near misses for longer Latin keywords ("cushon" → cushion).
pub fn map_cut_keyword(text: &str) -> Option<&'static str> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if let Some((_, shape)) = CUT_KEYWORDS.iter().find(|(kw, _)| *kw == lower) {
        return Some(*shape);
    }

    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for token in &tokens {
        if let Some((_, shape)) = CUT_KEYWORDS.iter().find(|(kw, _)| kw == token) {
            return Some(*shape);
        }
    }

    if let Some((_, shape)) = CUT_KEYWORDS
        .iter()
        .find(|(kw, _)| !kw.is_ascii() && lower.contains(kw))
    {
        return Some(*shape);
    }

    for token in tokens.iter().filter(|t| t.chars().count() >= FUZZY_MIN_LEN) {
        if let Some((_, shape)) = CUT_KEYWORDS.iter().find(|(kw, _)| {
            kw.is_ascii() && kw.len() >= FUZZY_MIN_LEN && strsim::levenshtein(kw, token) <= 1
        }) {
            return Some(*shape);
        }
    }

    None
}

/// Extraction strategy for labels and documents
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelStrategy;

impl ExtractionStrategy for LabelStrategy {
    fn category(&self) -> ImageType {
        ImageType::Label
    }

    fn instructions(&self) -> &'static str {
        LABEL_INSTRUCTIONS
    }

    fn accepts(&self, field: ClaimField, method: ProvenanceMethod) -> bool {
        use ProvenanceMethod::*;
        match field {
            ClaimField::LabelText => method == LabelOcr,
            ClaimField::Notes => true,
            ClaimField::InstrumentReadoutMm | ClaimField::InstrumentRange => false,
            _ => matches!(method, LabelOcr | TextParsing),
        }
    }

    fn refine(&self, claims: Vec<Claim>) -> Vec<Claim> {
        let claims: Vec<Claim> = claims.into_iter().filter_map(refine_claim).collect();
        order_dimension_pair(claims)
    }
}

fn refine_claim(mut claim: Claim) -> Option<Claim> {
    match claim.field {
        ClaimField::LabelText => {
            let text = claim.value.as_ref().and_then(ClaimValue::as_label)?;
            claim.value = Some(ClaimValue::Text(normalize_decimal(&text)));
            Some(claim)
        }
        ClaimField::CutShape => {
            let written = claim.value.as_ref().and_then(ClaimValue::as_label)?;
            match map_cut_keyword(&written) {
                Some(shape) => {
                    if claim.provenance.raw.is_none() {
                        claim.provenance.raw = Some(written);
                    }
                    claim.value = Some(ClaimValue::Text(shape.to_string()));
                    Some(claim)
                }
                None => {
                    debug!(keyword = %written, "Dropping unmapped cut keyword");
                    None
                }
            }
        }
        ClaimField::Notes => Some(claim),
        field if field.is_numeric() => Some(claim),
        // Colour, clarity, fluorescence and treatment words share the macro vocabulary
        _ => super::gem_macro::canonicalize_claim(claim),
    }
}

/// A label pair written "small x large" still yields max ≥ min
fn order_dimension_pair(mut claims: Vec<Claim>) -> Vec<Claim> {
    let max_idx: Vec<usize> = indices_of(&claims, ClaimField::DimensionMmMax);
    let min_idx: Vec<usize> = indices_of(&claims, ClaimField::DimensionMmMin);
    if let ([i], [j]) = (max_idx.as_slice(), min_idx.as_slice()) {
        let max = claims[*i].value.as_ref().and_then(ClaimValue::as_number);
        let min = claims[*j].value.as_ref().and_then(ClaimValue::as_number);
        if let (Some(max), Some(min)) = (max, min) {
            if max < min {
                debug!(max, min, "Label dimension pair reversed, swapping roles");
                claims[*i].field = ClaimField::DimensionMmMin;
                claims[*j].field = ClaimField::DimensionMmMax;
            }
        }
    }
    claims
}

fn indices_of(claims: &[Claim], field: ClaimField) -> Vec<usize> {
    claims
        .iter()
        .enumerate()
        .filter(|(_, c)| c.field == field)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_cut_keyword_exact_and_abbreviation() {
        assert_eq!(map_cut_keyword("Oval"), Some("oval"));
        assert_eq!(map_cut_keyword("OV"), Some("oval"));
        assert_eq!(map_cut_keyword("MQ 6x3"), Some("marquise"));
        assert_eq!(map_cut_keyword("Octagon step cut"), Some("emerald"));
    }

    #[test]
    fn test_map_cut_keyword_non_latin() {
        assert_eq!(map_cut_keyword("椭圆形 蓝宝石"), Some("oval"));
        assert_eq!(map_cut_keyword("马眼"), Some("marquise"));
    }

    #[test]
    fn test_map_cut_keyword_near_miss() {
        assert_eq!(map_cut_keyword("cushon"), Some("cushion"));
        assert_eq!(map_cut_keyword("marqise"), Some("marquise"));
        // short keywords never match fuzzily
        assert_eq!(map_cut_keyword("pearl"), None);
        assert_eq!(map_cut_keyword("sapphire"), None);
    }

    #[test]
    fn test_refine_maps_cut_shape_and_keeps_written_form() {
        let claim = Claim::new(
            ClaimField::CutShape,
            ClaimValue::Text("CUSH".into()),
            0.8,
            ProvenanceMethod::LabelOcr,
        );
        let refined = LabelStrategy.refine(vec![claim]);
        assert_eq!(refined[0].value, Some(ClaimValue::Text("cushion".into())));
        assert_eq!(refined[0].provenance.raw.as_deref(), Some("CUSH"));
    }

    #[test]
    fn test_refine_drops_unmapped_shape() {
        let claim = Claim::new(
            ClaimField::CutShape,
            ClaimValue::Text("fancy".into()),
            0.8,
            ProvenanceMethod::LabelOcr,
        );
        assert!(LabelStrategy.refine(vec![claim]).is_empty());
    }

    #[test]
    fn test_refine_normalizes_label_text() {
        let claim = Claim::new(
            ClaimField::LabelText,
            ClaimValue::Text("Spinel 0,92ct 6,1x4,2".into()),
            0.9,
            ProvenanceMethod::LabelOcr,
        );
        let refined = LabelStrategy.refine(vec![claim]);
        assert_eq!(
            refined[0].value,
            Some(ClaimValue::Text("Spinel 0.92ct 6.1x4.2".into()))
        );
    }

    #[test]
    fn test_refine_canonicalizes_categorical_labels() {
        let claims = vec![
            Claim::new(ClaimField::ColorFamily, ClaimValue::Text("Blue".into()), 0.8, ProvenanceMethod::TextParsing),
            Claim::new(ClaimField::ClarityEst, ClaimValue::Text("Eye Clean".into()), 0.8, ProvenanceMethod::TextParsing),
            Claim::new(ClaimField::ClarityEst, ClaimValue::Text("VVS2".into()), 0.9, ProvenanceMethod::LabelOcr),
        ];
        let refined = LabelStrategy.refine(claims);
        assert_eq!(refined.len(), 2);
        assert_eq!(refined[0].value, Some(ClaimValue::Text("blue".into())));
        assert_eq!(refined[1].value, Some(ClaimValue::Text("eye_clean".into())));
    }

    #[test]
    fn test_reversed_pair_swapped() {
        let claims = vec![
            Claim::new(ClaimField::DimensionMmMax, ClaimValue::Number(4.2), 0.9, ProvenanceMethod::LabelOcr),
            Claim::new(ClaimField::DimensionMmMin, ClaimValue::Number(6.1), 0.9, ProvenanceMethod::LabelOcr),
        ];
        let refined = LabelStrategy.refine(claims);
        assert_eq!(refined[0].field, ClaimField::DimensionMmMin);
        assert_eq!(refined[1].field, ClaimField::DimensionMmMax);
    }

    #[test]
    fn test_accepts() {
        let s = LabelStrategy;
        assert!(s.accepts(ClaimField::WeightCt, ProvenanceMethod::LabelOcr));
        assert!(s.accepts(ClaimField::ColorFamily, ProvenanceMethod::TextParsing));
        assert!(!s.accepts(ClaimField::WeightCt, ProvenanceMethod::LcdOcr));
        assert!(!s.accepts(ClaimField::LabelText, ProvenanceMethod::TextParsing));
    }
}

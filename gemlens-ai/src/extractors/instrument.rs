// Instrument Strategy
//
// Calipers, gauges, micrometers and carat scales. The digits are read
// strictly; the hard part is deciding which dimension a reading represents.

use super::ExtractionStrategy;
use crate::schema::{normalize_decimal, Claim, ClaimField, ClaimValue, ImageType, ProvenanceMethod};
use tracing::debug;

const INSTRUMENT_INSTRUCTIONS: &str = "\
Category: instrument (digital or analog caliper, gauge, micrometer, carat scale).
- Read the display strictly, digit by digit, with its unit. Put the exact readout, as displayed, in provenance.raw; give value in millimetres (convert cm or inch readouts). Use method lcd_ocr for digital displays and scale_detection for analog scales or dials.
- Decide what the reading measures:
  * jaws clamped across the stone's thickness (table to culet): dimension_mm_height
  * reading plausibly the longest span of the outline: dimension_mm_max
  * reading plausibly the shortest span of the outline: dimension_mm_min
  * orientation cannot be decided: instrument_readout_mm (never guess a dimension role)
- A carat scale display gives weight_ct.
- Optionally record the instrument's display range as instrument_range (text, e.g. \"0-150 mm\").
- Anything else worth noting goes into notes. Do not judge colour, clarity or cut from this image.";

/// Extraction strategy for measuring-instrument photos
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentStrategy;

impl ExtractionStrategy for InstrumentStrategy {
    fn category(&self) -> ImageType {
        ImageType::Instrument
    }

    fn instructions(&self) -> &'static str {
        INSTRUMENT_INSTRUCTIONS
    }

    fn accepts(&self, field: ClaimField, method: ProvenanceMethod) -> bool {
        use ProvenanceMethod::*;
        match field {
            f if f.is_dimension() => matches!(method, LcdOcr | ScaleDetection | GeometricEstimate),
            ClaimField::WeightCt => matches!(method, LcdOcr | ScaleDetection),
            ClaimField::InstrumentRange => matches!(method, LcdOcr | ScaleDetection | VisualInference | TextParsing),
            ClaimField::Notes => true,
            _ => false,
        }
    }

    fn refine(&self, claims: Vec<Claim>) -> Vec<Claim> {
        claims.into_iter().map(convert_to_millimetres).collect()
    }
}

/// Length unit found in an instrument readout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadoutUnit {
    Millimetre,
    Centimetre,
    Inch,
}

impl ReadoutUnit {
    pub fn to_mm_factor(self) -> f64 {
        match self {
            ReadoutUnit::Millimetre => 1.0,
            ReadoutUnit::Centimetre => 10.0,
            ReadoutUnit::Inch => 25.4,
        }
    }
}

/// Detect the unit printed in a readout ("0.62 cm", "6.20mm", "0.244 in")
pub fn detect_unit(raw: &str) -> Option<ReadoutUnit> {
    let lower = raw.to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphabetic() && c != '"')
        .filter(|token| !token.is_empty())
        .find_map(|token| match token {
            "mm" => Some(ReadoutUnit::Millimetre),
            "cm" => Some(ReadoutUnit::Centimetre),
            "in" | "inch" | "inches" | "\"" => Some(ReadoutUnit::Inch),
            _ => None,
        })
}

/// First number printed in a readout ("0,50 cm" → 0.5)
pub fn readout_number(raw: &str) -> Option<f64> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let run: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    normalize_decimal(run.trim_end_matches(['.', ','])).parse().ok()
}

/// Dimension readings still expressed in cm or inches are converted to mm
///
/// A value is converted only while it still equals the number in the raw
/// readout; a value the oracle already converted is left alone.
fn convert_to_millimetres(mut claim: Claim) -> Claim {
    if !claim.field.is_dimension() {
        return claim;
    }
    let Some(raw) = claim.provenance.raw.as_deref() else {
        return claim;
    };
    let Some(unit) = detect_unit(raw).filter(|u| *u != ReadoutUnit::Millimetre) else {
        return claim;
    };
    let Some(&ClaimValue::Number(value)) = claim.value.as_ref() else {
        return claim;
    };
    match readout_number(raw) {
        Some(read) if (read - value).abs() < 1e-9 => {
            let converted = value * unit.to_mm_factor();
            debug!(
                field = %claim.field,
                from = value,
                to = converted,
                "Converted {:?} readout to millimetres",
                unit
            );
            claim.value = Some(ClaimValue::Number(converted));
        }
        _ => debug!(
            field = %claim.field,
            value,
            raw = %raw,
            "Value differs from the {:?} readout, taken as already in millimetres",
            unit
        ),
    }
    claim
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_dimension_only_with_readout_methods() {
        let s = InstrumentStrategy;
        assert!(s.accepts(ClaimField::DimensionMmHeight, ProvenanceMethod::LcdOcr));
        assert!(s.accepts(ClaimField::InstrumentReadoutMm, ProvenanceMethod::ScaleDetection));
        assert!(!s.accepts(ClaimField::DimensionMmHeight, ProvenanceMethod::VisualInference));
        assert!(!s.accepts(ClaimField::ColorFamily, ProvenanceMethod::VisualInference));
    }

    #[test]
    fn test_detect_unit() {
        assert_eq!(detect_unit("6.20mm"), Some(ReadoutUnit::Millimetre));
        assert_eq!(detect_unit("0.62 cm"), Some(ReadoutUnit::Centimetre));
        assert_eq!(detect_unit("0.244 in"), Some(ReadoutUnit::Inch));
        assert_eq!(detect_unit("6.20"), None);
    }

    #[test]
    fn test_centimetre_reading_converted() {
        let claim = Claim::new(
            ClaimField::DimensionMmHeight,
            ClaimValue::Number(0.42),
            0.9,
            ProvenanceMethod::LcdOcr,
        )
        .with_raw("0.42 cm");
        let refined = InstrumentStrategy.refine(vec![claim]);
        match refined[0].value {
            Some(ClaimValue::Number(v)) => assert!((v - 4.2).abs() < 1e-9),
            ref other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_already_converted_value_kept() {
        let claim = Claim::new(
            ClaimField::DimensionMmHeight,
            ClaimValue::Number(5.0),
            0.9,
            ProvenanceMethod::LcdOcr,
        )
        .with_raw("0.50 cm");
        let refined = InstrumentStrategy.refine(vec![claim]);
        assert_eq!(refined[0].value, Some(ClaimValue::Number(5.0)));
    }

    #[test]
    fn test_readout_number() {
        assert_eq!(readout_number("0,50 cm"), Some(0.5));
        assert_eq!(readout_number("H: 4.31mm"), Some(4.31));
        assert_eq!(readout_number("cm"), None);
    }

    #[test]
    fn test_weight_not_converted() {
        let claim = Claim::new(
            ClaimField::WeightCt,
            ClaimValue::Number(1.02),
            0.9,
            ProvenanceMethod::LcdOcr,
        )
        .with_raw("1.02 ct");
        let refined = InstrumentStrategy.refine(vec![claim.clone()]);
        assert_eq!(refined[0], claim);
    }
}

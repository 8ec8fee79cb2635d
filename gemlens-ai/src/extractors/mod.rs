//! Category Extractors - per-category claim extraction
//!
//! Three strategies (instrument, label, gem_macro) share one output contract,
//! `PerImageExtraction`, and differ in the instructions given to the oracle
//! and in the deterministic clean-up applied to what comes back:
//!
//! 1. Oracle answer is validated against the claim schema (`schema::validation`)
//! 2. Claims the strategy does not accept for its category are dropped
//!    (e.g. a colour judgement on a caliper photo, a label dimension without OCR provenance)
//! 3. Numeric strings become numbers
//! 4. Strategy-specific refinement (unit conversion, keyword mapping, buckets)
//!
//! `unknown` images are never sent to the oracle.

pub mod gem_macro;
pub mod instrument;
pub mod label;

use crate::error::AnalysisResult;
use crate::image::ImageRef;
use crate::oracle::{call_with_timeout, OracleRequest, VisionOracle};
use crate::schema::json_schema::{extraction_schema, EXTRACTION_SCHEMA_NAME};
use crate::schema::validation::{parse_extraction, ValidationPolicy};
use crate::schema::{Claim, ClaimField, ClaimValue, ImageType, PerImageExtraction, ProvenanceMethod};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub use gem_macro::GemMacroStrategy;
pub use instrument::InstrumentStrategy;
pub use label::LabelStrategy;

/// Rules every category shares
const SHARED_RULES: &str = "\
You extract typed claims about one loose gemstone from one photograph.
Rules:
- Never fabricate. If a value is not clearly supported by the image, omit the claim entirely.
- Use only the listed claim fields and provenance methods.
- Every claim carries a confidence between 0 and 1 reflecting how clearly the image supports it.
- Every claim carries provenance: the method used, the pixel bbox [x, y, width, height] of the evidence when you can locate it (else null), and the raw text or readout you read (else null).
- Lengths are millimetres, weights are carats. Use a point as decimal separator in numeric values.
- Return image_id and image_type unchanged.";

/// Category-specific extraction behaviour
pub trait ExtractionStrategy: Send + Sync {
    /// Category this strategy handles
    fn category(&self) -> ImageType;

    /// Category instructions appended to the shared rules
    fn instructions(&self) -> &'static str;

    /// Whether a claim of this field, derived this way, belongs to the category
    fn accepts(&self, field: ClaimField, method: ProvenanceMethod) -> bool;

    /// Category-specific clean-up after generic normalization
    fn refine(&self, claims: Vec<Claim>) -> Vec<Claim> {
        claims
    }
}

/// Apply acceptance, numeric normalization and refinement to validated claims
pub fn post_process(
    strategy: &dyn ExtractionStrategy,
    image_id: &str,
    claims: Vec<Claim>,
) -> Vec<Claim> {
    let accepted: Vec<Claim> = claims
        .into_iter()
        .filter(|claim| {
            let keep = strategy.accepts(claim.field, claim.provenance.method);
            if !keep {
                debug!(
                    image_id = %image_id,
                    field = %claim.field,
                    method = %claim.provenance.method,
                    category = %strategy.category(),
                    "Dropping claim not accepted for category"
                );
            }
            keep
        })
        .filter_map(|claim| normalize_numeric(image_id, claim))
        .collect();

    strategy.refine(accepted)
}

/// Numeric fields must read as numbers; text readings are converted
fn normalize_numeric(image_id: &str, mut claim: Claim) -> Option<Claim> {
    if !claim.field.is_numeric() {
        return Some(claim);
    }
    match claim.value.as_ref().and_then(ClaimValue::as_number) {
        Some(n) => {
            claim.value = Some(ClaimValue::Number(n));
            Some(claim)
        }
        None => {
            debug!(
                image_id = %image_id,
                field = %claim.field,
                value = ?claim.value,
                "Dropping non-numeric value for numeric field"
            );
            None
        }
    }
}

/// Category extractor backed by a vision oracle
#[derive(Clone)]
pub struct CategoryExtractor {
    oracle: Arc<dyn VisionOracle>,
    timeout: Duration,
    policy: ValidationPolicy,
    schema: Value,
    instrument: InstrumentStrategy,
    label: LabelStrategy,
    gem_macro: GemMacroStrategy,
}

impl CategoryExtractor {
    pub fn new(oracle: Arc<dyn VisionOracle>, timeout: Duration, policy: ValidationPolicy) -> Self {
        Self {
            oracle,
            timeout,
            policy,
            schema: extraction_schema(),
            instrument: InstrumentStrategy,
            label: LabelStrategy,
            gem_macro: GemMacroStrategy,
        }
    }

    /// Strategy for a category (`None` for `unknown`)
    pub fn strategy_for(&self, image_type: ImageType) -> Option<&dyn ExtractionStrategy> {
        match image_type {
            ImageType::Instrument => Some(&self.instrument),
            ImageType::Label => Some(&self.label),
            ImageType::GemMacro => Some(&self.gem_macro),
            ImageType::Unknown => None,
        }
    }

    /// Extract claims from one image of a known category
    ///
    /// # Errors
    /// * `MissingSource` - image has neither URL nor data
    /// * `Timeout` - oracle exceeded the time bound
    /// * `MalformedOutput` - answer is not an extraction object
    /// * `Validation` - out-of-vocabulary claim under strict vocabulary
    pub async fn extract(
        &self,
        image: &ImageRef,
        image_type: ImageType,
    ) -> AnalysisResult<PerImageExtraction> {
        let Some(strategy) = self.strategy_for(image_type) else {
            debug!(image_id = %image.image_id, "Skipping extraction for unknown image");
            return Ok(PerImageExtraction::empty(&image.image_id, image_type));
        };

        let instructions = format!("{}\n\n{}", SHARED_RULES, strategy.instructions());
        let request = OracleRequest {
            image_id: &image.image_id,
            image: image.source()?,
            instructions: &instructions,
            schema_name: EXTRACTION_SCHEMA_NAME,
            schema: &self.schema,
        };

        let answer = call_with_timeout(self.oracle.as_ref(), &request, self.timeout).await?;
        let validated = parse_extraction(&answer, &image.image_id, image_type, self.policy)?;
        let received = validated.claims.len();
        let claims = post_process(strategy, &image.image_id, validated.claims);

        info!(
            image_id = %image.image_id,
            image_type = %image_type,
            received,
            kept = claims.len(),
            "Claims extracted"
        );

        Ok(PerImageExtraction {
            image_id: validated.image_id,
            image_type,
            claims,
        })
    }
}

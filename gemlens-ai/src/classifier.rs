//! Image Classifier
//!
//! Routes one image to `instrument`, `label`, `gem_macro` or `unknown`. Never
//! produces attribute claims. An answer that does not parse into a
//! `Classification` is an error; it is not turned into `unknown`.

use crate::error::AnalysisResult;
use crate::image::ImageRef;
use crate::oracle::{call_with_timeout, OracleRequest, VisionOracle};
use crate::schema::json_schema::{classification_schema, CLASSIFICATION_SCHEMA_NAME};
use crate::schema::validation::parse_classification;
use crate::schema::Classification;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CLASSIFICATION_INSTRUCTIONS: &str = "\
You route photographs of a single loose gemstone to the right reading step.
Classify the image into exactly one category:
- instrument: a measuring device readout is the main subject (digital or analog caliper, gauge, micrometer, carat scale display).
- label: packaging tag, parcel paper, handwritten note, invoice or any document describing the stone, in any script.
- gem_macro: a close-up of the gemstone itself, where shape, colour or inclusions can be judged.
- unknown: none of the above, or the image is too blurred, dark or cropped to tell.
If several subjects are visible, pick the single category that best matches the main subject; never split.
Do not guess: a poor or unrecognizable image is unknown.
Do not report any stone attributes. Return image_id unchanged, a confidence between 0 and 1, and a one-sentence reason.";

/// Image classifier backed by a vision oracle
#[derive(Clone)]
pub struct ImageClassifier {
    oracle: Arc<dyn VisionOracle>,
    timeout: Duration,
    schema: Value,
}

impl ImageClassifier {
    pub fn new(oracle: Arc<dyn VisionOracle>, timeout: Duration) -> Self {
        Self {
            oracle,
            timeout,
            schema: classification_schema(),
        }
    }

    /// Classify one image
    ///
    /// # Errors
    /// * `MissingSource` - image has neither URL nor data
    /// * `Timeout` - oracle exceeded the time bound
    /// * `MalformedOutput` - answer does not match the classification shape
    pub async fn classify(&self, image: &ImageRef) -> AnalysisResult<Classification> {
        let request = OracleRequest {
            image_id: &image.image_id,
            image: image.source()?,
            instructions: CLASSIFICATION_INSTRUCTIONS,
            schema_name: CLASSIFICATION_SCHEMA_NAME,
            schema: &self.schema,
        };

        let answer = call_with_timeout(self.oracle.as_ref(), &request, self.timeout).await?;
        let classification = parse_classification(&answer, &image.image_id)?;

        info!(
            image_id = %classification.image_id,
            image_type = %classification.image_type,
            confidence = classification.confidence,
            "Image classified: {}",
            classification.reason
        );

        Ok(classification)
    }
}

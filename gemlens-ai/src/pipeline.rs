//! Gemstone Pipeline
//!
//! Runs classify → extract for every image of one gemstone with bounded
//! parallelism, then fuses whatever came back:
//!
//! - Per-image error isolation: a failed image is recorded in `failures` and
//!   its siblings carry on
//! - Optional deadline and cancellation token: the run stops waiting, marks
//!   the report incomplete and fuses the extractions it already has
//! - Extractions are reported in input order regardless of completion order

use crate::classifier::ImageClassifier;
use crate::error::AnalysisResult;
use crate::extractors::CategoryExtractor;
use crate::fusion::{fuse, FusionConfig};
use crate::image::ImageRef;
use crate::oracle::VisionOracle;
use crate::schema::validation::ValidationPolicy;
use crate::schema::{FusionResult, PerImageExtraction};
use futures::stream::{self, StreamExt};
use gemlens_common::config::TomlConfig;
use gemlens_common::events::{AnalysisEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Failure kind for images still pending when the run was cut short
pub const NOT_PROCESSED: &str = "not_processed";

/// An image that produced no extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub image_id: String,
    /// `AnalysisError::kind()` label, or `not_processed`
    pub kind: String,
    pub message: String,
}

/// Outcome of analyzing one gemstone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemstoneReport {
    pub gemstone_id: String,
    pub run_id: Uuid,
    pub extractions: Vec<PerImageExtraction>,
    pub failures: Vec<ImageFailure>,
    pub fusion: FusionResult,
    /// False when the deadline or cancellation stopped the run early
    pub complete: bool,
}

/// Classifies, extracts and fuses the image set of one gemstone
#[derive(Clone)]
pub struct GemstoneAnalyzer {
    classifier: ImageClassifier,
    extractor: CategoryExtractor,
    fusion: FusionConfig,
    max_concurrent: usize,
    deadline: Option<Duration>,
    event_bus: Option<EventBus>,
}

impl GemstoneAnalyzer {
    pub fn new(
        oracle: Arc<dyn VisionOracle>,
        timeout: Duration,
        policy: ValidationPolicy,
        fusion: FusionConfig,
    ) -> Self {
        Self {
            classifier: ImageClassifier::new(Arc::clone(&oracle), timeout),
            extractor: CategoryExtractor::new(oracle, timeout, policy),
            fusion,
            max_concurrent: 4,
            deadline: None,
            event_bus: None,
        }
    }

    /// Build an analyzer from the loaded TOML configuration
    pub fn from_config(oracle: Arc<dyn VisionOracle>, config: &TomlConfig) -> Self {
        Self::new(
            oracle,
            Duration::from_secs(config.oracle.timeout_secs),
            ValidationPolicy::from(&config.extraction),
            config.fusion.into(),
        )
        .with_max_concurrent(config.pipeline.max_concurrent_images)
        .with_deadline(config.pipeline.deadline_secs.map(Duration::from_secs))
    }

    /// Number of images processed at once (minimum 1)
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: AnalysisEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }

    /// Analyze all images of one gemstone
    pub async fn analyze(&self, gemstone_id: &str, images: Vec<ImageRef>) -> GemstoneReport {
        self.analyze_with_cancel(gemstone_id, images, CancellationToken::new())
            .await
    }

    /// Analyze all images of one gemstone, stopping early if `cancel` fires
    pub async fn analyze_with_cancel(
        &self,
        gemstone_id: &str,
        images: Vec<ImageRef>,
        cancel: CancellationToken,
    ) -> GemstoneReport {
        let run_id = Uuid::new_v4();
        let total = images.len();

        info!(
            run_id = %run_id,
            gemstone_id = %gemstone_id,
            images = total,
            "Starting gemstone analysis"
        );
        self.emit(AnalysisEvent::GemstoneStarted {
            run_id,
            gemstone_id: gemstone_id.to_string(),
            image_count: total,
            timestamp: chrono::Utc::now(),
        });

        let mut outcomes: Vec<Option<AnalysisResult<PerImageExtraction>>> =
            (0..total).map(|_| None).collect();
        let mut complete = true;

        {
            let mut results = stream::iter(images.iter().enumerate())
                .map(move |(index, image)| async move {
                    (index, self.process_image(run_id, image).await)
                })
                .buffer_unordered(self.max_concurrent);

            let deadline = async {
                match self.deadline {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    biased;

                    next = results.next() => match next {
                        Some((index, outcome)) => outcomes[index] = Some(outcome),
                        None => break,
                    },
                    _ = cancel.cancelled() => {
                        warn!(run_id = %run_id, gemstone_id = %gemstone_id, "Analysis cancelled, fusing partial results");
                        complete = false;
                        break;
                    }
                    _ = &mut deadline => {
                        warn!(
                            run_id = %run_id,
                            gemstone_id = %gemstone_id,
                            "Deadline of {:?} passed, fusing partial results",
                            self.deadline.unwrap_or_default()
                        );
                        complete = false;
                        break;
                    }
                }
            }
        }

        let mut extractions = Vec::new();
        let mut failures = Vec::new();
        for (image, outcome) in images.iter().zip(outcomes) {
            match outcome {
                Some(Ok(extraction)) => extractions.push(extraction),
                Some(Err(e)) => failures.push(ImageFailure {
                    image_id: image.image_id.clone(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }),
                None => failures.push(ImageFailure {
                    image_id: image.image_id.clone(),
                    kind: NOT_PROCESSED.to_string(),
                    message: "Run ended before this image was processed".to_string(),
                }),
            }
        }

        let fusion = fuse(&extractions, &self.fusion);

        info!(
            run_id = %run_id,
            gemstone_id = %gemstone_id,
            extracted = extractions.len(),
            failed = failures.len(),
            conflicts = fusion.conflicts.len(),
            needs_review = fusion.needs_review,
            complete,
            "Gemstone analysis finished"
        );
        self.emit(AnalysisEvent::GemstoneFused {
            run_id,
            gemstone_id: gemstone_id.to_string(),
            conflicts: fusion.conflicts.len(),
            needs_review: fusion.needs_review,
            complete,
            timestamp: chrono::Utc::now(),
        });

        GemstoneReport {
            gemstone_id: gemstone_id.to_string(),
            run_id,
            extractions,
            failures,
            fusion,
            complete,
        }
    }

    /// Classify then extract one image, reporting the outcome as events
    async fn process_image(
        &self,
        run_id: Uuid,
        image: &ImageRef,
    ) -> AnalysisResult<PerImageExtraction> {
        debug!(run_id = %run_id, image_id = %image.image_id, "Processing image");

        let result = self.classify_and_extract(run_id, image).await;
        match &result {
            Ok(extraction) => self.emit(AnalysisEvent::ImageExtracted {
                run_id,
                image_id: image.image_id.clone(),
                claim_count: extraction.claims.len(),
                timestamp: chrono::Utc::now(),
            }),
            Err(e) => {
                // Per-image isolation: siblings continue
                warn!(
                    run_id = %run_id,
                    image_id = %image.image_id,
                    kind = e.kind(),
                    "Image analysis failed: {}",
                    e
                );
                self.emit(AnalysisEvent::ImageFailed {
                    run_id,
                    image_id: image.image_id.clone(),
                    error_kind: e.kind().to_string(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        result
    }

    async fn classify_and_extract(
        &self,
        run_id: Uuid,
        image: &ImageRef,
    ) -> AnalysisResult<PerImageExtraction> {
        let classification = self.classifier.classify(image).await?;
        self.emit(AnalysisEvent::ImageClassified {
            run_id,
            image_id: image.image_id.clone(),
            image_type: classification.image_type.to_string(),
            confidence: classification.confidence,
            timestamp: chrono::Utc::now(),
        });

        self.extractor
            .extract(image, classification.image_type)
            .await
    }
}

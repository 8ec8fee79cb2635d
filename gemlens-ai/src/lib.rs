//! gemlens-ai library interface
//!
//! Three-stage gemstone recognition:
//! 1. `classifier` routes each image to instrument / label / gem_macro / unknown
//! 2. `extractors` turn one image into typed, confidence-scored claims
//! 3. `fusion` reconciles all claims of one gemstone into a single record
//!
//! `pipeline` wires the stages together with bounded concurrency; `oracle`
//! is the injected vision capability behind stages 1 and 2.

pub mod classifier;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod image;
pub mod oracle;
pub mod pipeline;
pub mod schema;

pub use crate::error::{AnalysisError, AnalysisResult};
pub use crate::fusion::{fuse, FusionConfig};
pub use crate::image::ImageRef;
pub use crate::oracle::{HttpVisionOracle, VisionOracle};
pub use crate::pipeline::{GemstoneAnalyzer, GemstoneReport, ImageFailure};

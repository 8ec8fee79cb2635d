//! Image references
//!
//! An image reaches the oracle either as a URL or as inline base64 data. The
//! surrounding application decides which; this module only checks that one of
//! them is present and renders the form the oracle expects.

use crate::error::{AnalysisError, AnalysisResult};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One image belonging to a gemstone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Base64-encoded image bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,

    /// MIME type of `base64` (defaults to image/jpeg)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Resolved image payload
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource<'a> {
    Url(&'a str),
    Inline { data: &'a str, mime_type: &'a str },
}

impl ImageSource<'_> {
    /// URL form accepted by the oracle's `image_url` part
    pub fn to_oracle_url(&self) -> String {
        match self {
            ImageSource::Url(url) => url.to_string(),
            ImageSource::Inline { data, mime_type } => {
                format!("data:{};base64,{}", mime_type, data)
            }
        }
    }
}

impl ImageRef {
    pub fn from_url(image_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            url: Some(url.into()),
            base64: None,
            mime_type: None,
        }
    }

    pub fn from_bytes(image_id: impl Into<String>, bytes: &[u8], mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::to_string)
            .or_else(|| infer::get(bytes).map(|kind| kind.mime_type().to_string()));
        Self {
            image_id: image_id.into(),
            url: None,
            base64: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            mime_type,
        }
    }

    /// Load a local file as inline data, using the file stem as image id
    pub async fn from_path(path: &Path) -> AnalysisResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let image_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let image = Self::from_bytes(image_id, &bytes, None);
        debug!(
            image_id = %image.image_id,
            bytes = bytes.len(),
            mime_type = ?image.mime_type,
            "Loaded image from {}",
            path.display()
        );
        Ok(image)
    }

    /// Payload to send, preferring inline data over a URL
    ///
    /// Blank strings count as absent.
    pub fn source(&self) -> AnalysisResult<ImageSource<'_>> {
        fn present(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.trim().is_empty())
        }

        if let Some(data) = present(&self.base64) {
            let mime_type = self.mime_type.as_deref().unwrap_or("image/jpeg");
            return Ok(ImageSource::Inline { data, mime_type });
        }
        if let Some(url) = present(&self.url) {
            return Ok(ImageSource::Url(url));
        }
        Err(AnalysisError::MissingSource(self.image_id.clone()))
    }
}

/// Client side of the external image classification service
///
/// The classifier receives the path of an already stored image and answers
/// with a JSON prediction. Any failure to get a usable prediction is a
/// `ClassificationError`; callers decide what that means for the upload.

pub mod http;

pub use http::HttpClassifier;

use crate::records::AnalysisResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Why a classification attempt produced no prediction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// No response within the configured timeout
    #[error("Classifier did not respond within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection-level failure
    #[error("Classifier unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status from the classifier
    #[error("Classifier returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Success status but no usable prediction in the body
    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),
}

impl ClassificationError {
    /// Upstream HTTP status, when the classifier answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClassificationError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClassificationError::Timeout { .. } => "timeout",
            ClassificationError::Unreachable(_) => "unreachable",
            ClassificationError::Upstream { .. } => "upstream",
            ClassificationError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Result of one classification attempt
pub type AnalysisOutcome = Result<AnalysisResult, ClassificationError>;

/// Model status reported by the classifier service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_loaded: bool,
    #[serde(default)]
    pub class_names: Option<Vec<String>>,
}

/// Classifier trait
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the stored image at `storage_path`; a single attempt
    async fn classify(&self, storage_path: &Path) -> AnalysisOutcome;

    /// Ask the classifier whether its model is loaded
    async fn model_info(&self) -> Result<ModelInfo, ClassificationError>;
}

/// Image record data models
use crate::{
    error::{HerdError, HerdResult},
    file_store::StoredFile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque identifier of the authenticated owner of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> HerdResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(HerdError::Authentication("Empty owner identity".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classifier payload, kept as the JSON object the classifier returned
///
/// Only `predicted_class` is interpreted; every other field (confidence,
/// per-class probabilities, ...) is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(Map<String, Value>);

impl AnalysisResult {
    pub const PREDICTED_CLASS: &'static str = "predicted_class";

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Predicted label, if present and a non-empty string
    pub fn predicted_class(&self) -> Option<&str> {
        self.0
            .get(Self::PREDICTED_CLASS)
            .and_then(Value::as_str)
            .filter(|label| !label.is_empty())
    }
}

/// Analysis status as stored and reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Analyzed,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> HerdResult<Self> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "analyzed" => Ok(AnalysisStatus::Analyzed),
            "error" => Ok(AnalysisStatus::Error),
            _ => Err(HerdError::Storage(format!("Invalid analysis status: {}", s))),
        }
    }
}

/// Analysis state of a record
///
/// The result only exists in the `Analyzed` state, so a record can never
/// be analyzed without a result or carry a result while pending or failed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    Pending,
    Analyzed(AnalysisResult),
    Error,
}

impl RecordState {
    pub fn status(&self) -> AnalysisStatus {
        match self {
            RecordState::Pending => AnalysisStatus::Pending,
            RecordState::Analyzed(_) => AnalysisStatus::Analyzed,
            RecordState::Error => AnalysisStatus::Error,
        }
    }

    pub fn analysis_result(&self) -> Option<&AnalysisResult> {
        match self {
            RecordState::Analyzed(result) => Some(result),
            _ => None,
        }
    }
}

/// Terminal state a pending record moves to once the classifier resolves
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalState {
    Analyzed(AnalysisResult),
    Error,
}

impl From<TerminalState> for RecordState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Analyzed(result) => RecordState::Analyzed(result),
            TerminalState::Error => RecordState::Error,
        }
    }
}

/// One uploaded image and its analysis outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub filename: String,
    pub original_name: String,
    pub storage_path: PathBuf,
    pub size_bytes: i64,
    pub mime_type: String,
    pub upload_date: DateTime<Utc>,
    pub state: RecordState,
}

impl ImageRecord {
    /// Fresh pending record for a stored file
    pub fn pending(owner_id: OwnerId, file: &StoredFile, upload_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            filename: file.filename.clone(),
            original_name: file.original_name.clone(),
            storage_path: file.storage_path.clone(),
            size_bytes: file.size_bytes,
            mime_type: file.mime_type.clone(),
            upload_date,
            state: RecordState::Pending,
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.state.status()
    }

    pub fn analysis_result(&self) -> Option<&AnalysisResult> {
        self.state.analysis_result()
    }
}

/// Image as returned to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub upload_date: DateTime<Utc>,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<AnalysisResult>,
}

impl From<&ImageRecord> for ImageView {
    fn from(record: &ImageRecord) -> Self {
        Self {
            id: record.id,
            filename: record.filename.clone(),
            original_name: record.original_name.clone(),
            upload_date: record.upload_date,
            status: record.status(),
            analysis_result: record.analysis_result().cloned(),
        }
    }
}

/// Upload and analysis orchestration
///
/// An upload is accepted once the file is stored and its pending record
/// exists. Classification runs after that and can only change which
/// terminal state the record reaches; it never turns an accepted upload
/// into a failed one.

use crate::{
    classifier::{ClassificationError, Classifier},
    error::{HerdError, HerdResult},
    file_store::{self, FileStore, IncomingFile},
    metrics,
    records::{ImageRecord, OwnerId, RecordStore, TerminalState},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What happened to an accepted upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The record as persisted
    pub record: ImageRecord,
    /// Set when the classifier produced no prediction
    pub analysis_error: Option<ClassificationError>,
    /// Set when the terminal state could not be persisted
    pub storage_error: Option<String>,
}

/// Coordinates file storage, record persistence and classification
#[derive(Clone)]
pub struct UploadOrchestrator {
    records: Arc<dyn RecordStore>,
    files: Arc<dyn FileStore>,
    classifier: Arc<dyn Classifier>,
    max_upload_size: usize,
}

impl UploadOrchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        files: Arc<dyn FileStore>,
        classifier: Arc<dyn Classifier>,
        max_upload_size: usize,
    ) -> Self {
        Self {
            records,
            files,
            classifier,
            max_upload_size,
        }
    }

    /// Accept an upload, then analyze it
    ///
    /// The file is checked before the owner, and both before anything is
    /// written.
    pub async fn submit_upload(
        &self,
        owner: Option<OwnerId>,
        file: Option<IncomingFile>,
    ) -> HerdResult<UploadOutcome> {
        let result = self.accept(owner, file).await;
        if let Err(e) = &result {
            metrics::record_upload(match e {
                HerdError::Storage(_) | HerdError::Io(_) | HerdError::Database(_) => "storage_error",
                _ => "rejected",
            });
        }
        let (owner, record) = result?;

        info!(
            "Accepted upload {} ({}, {} bytes) for {}",
            record.id, record.original_name, record.size_bytes, owner
        );

        Ok(self.analyze(&owner, record).await)
    }

    /// Validate, store the bytes and create the pending record
    async fn accept(
        &self,
        owner: Option<OwnerId>,
        file: Option<IncomingFile>,
    ) -> HerdResult<(OwnerId, ImageRecord)> {
        let file = file.ok_or_else(|| HerdError::Validation("No image file provided".to_string()))?;
        let owner = owner
            .ok_or_else(|| HerdError::Authentication("User must be authenticated".to_string()))?;

        let mime_type = file_store::validate_incoming(&file, self.max_upload_size)?;

        let stored = self.files.store(file, &mime_type).await.map_err(into_storage)?;

        match self.records.create(&owner, &stored).await {
            Ok(record) => Ok((owner, record)),
            Err(e) => {
                error!("Failed to create record for {}: {}", stored.filename, e);
                if let Err(cleanup) = self.files.remove(&stored).await {
                    warn!("Failed to remove orphaned upload {}: {}", stored.filename, cleanup);
                }
                Err(into_storage(e))
            }
        }
    }

    /// Classify a pending record and persist its terminal state
    async fn analyze(&self, owner: &OwnerId, record: ImageRecord) -> UploadOutcome {
        let started = Instant::now();
        let outcome = self.classifier.classify(&record.storage_path).await;
        let elapsed = started.elapsed().as_secs_f64();

        let (terminal, analysis_error) = match outcome {
            Ok(result) => {
                metrics::record_classifier_call(elapsed, None);
                (TerminalState::Analyzed(result), None)
            }
            Err(e) => {
                metrics::record_classifier_call(elapsed, Some(e.kind()));
                warn!(
                    upstream_status = ?e.status(),
                    kind = e.kind(),
                    "Analysis of image {} failed: {}",
                    record.id,
                    e
                );
                (TerminalState::Error, Some(e))
            }
        };

        match self.records.resolve(owner, record.id, terminal).await {
            Ok(updated) => {
                info!(
                    "Image {} is {} ({:.2}s classifier time)",
                    updated.id,
                    updated.status().as_str(),
                    elapsed
                );
                metrics::record_upload(if analysis_error.is_some() {
                    "analysis_error"
                } else {
                    "analyzed"
                });
                UploadOutcome {
                    record: updated,
                    analysis_error,
                    storage_error: None,
                }
            }
            Err(e) => {
                // The upload stays accepted; the record stays pending
                error!(
                    "Terminal storage error: could not record analysis of image {}: {}",
                    record.id, e
                );
                metrics::record_upload("update_failed");
                UploadOutcome {
                    record,
                    analysis_error,
                    storage_error: Some(into_storage(e).to_string()),
                }
            }
        }
    }
}

fn into_storage(e: HerdError) -> HerdError {
    match e {
        HerdError::Storage(_) => e,
        other => HerdError::Storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        file_store::DiskFileStore,
        records::{AnalysisStatus, SqliteRecordStore},
        test_support::{FlakyRecordStore, StoreFailures, StubClassifier},
    };
    use tempfile::{tempdir, TempDir};

    const LIMIT: usize = 1024 * 1024;

    struct Harness {
        orchestrator: UploadOrchestrator,
        records: SqliteRecordStore,
        classifier: Arc<StubClassifier>,
        uploads: TempDir,
    }

    async fn harness(classifier: StubClassifier, failures: StoreFailures) -> Harness {
        let uploads = tempdir().unwrap();
        let records = SqliteRecordStore::new(db::in_memory_pool().await);
        let classifier = Arc::new(classifier);
        let orchestrator = UploadOrchestrator::new(
            Arc::new(FlakyRecordStore::new(records.clone(), failures)),
            Arc::new(DiskFileStore::new(uploads.path().to_path_buf())),
            classifier.clone(),
            LIMIT,
        );
        Harness {
            orchestrator,
            records,
            classifier,
            uploads,
        }
    }

    fn owner() -> OwnerId {
        OwnerId::new("64f1c0ffee").unwrap()
    }

    fn cow_photo() -> IncomingFile {
        IncomingFile {
            original_name: "cow.jpg".to_string(),
            content_type: Some("image/jpeg".to_string()),
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4],
        }
    }

    fn upload_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected_before_anything_is_written() {
        let h = harness(StubClassifier::predicting("healthy"), StoreFailures::default()).await;

        let err = h.orchestrator.submit_upload(Some(owner()), None).await.unwrap_err();
        assert!(matches!(err, HerdError::Validation(_)));

        // Missing file wins over missing owner
        let err = h.orchestrator.submit_upload(None, None).await.unwrap_err();
        assert!(matches!(err, HerdError::Validation(_)));

        assert!(h.records.list_for_owner(&owner()).await.unwrap().is_empty());
        assert_eq!(h.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_owner_is_unauthorized() {
        let h = harness(StubClassifier::predicting("healthy"), StoreFailures::default()).await;

        let err = h
            .orchestrator
            .submit_upload(None, Some(cow_photo()))
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::Authentication(_)));
        assert_eq!(upload_count(&h.uploads), 0);
        assert_eq!(h.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_type_is_rejected() {
        let h = harness(StubClassifier::predicting("healthy"), StoreFailures::default()).await;
        let file = IncomingFile {
            original_name: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            data: b"not a cow".to_vec(),
        };

        let err = h.orchestrator.submit_upload(Some(owner()), Some(file)).await.unwrap_err();
        assert!(matches!(err, HerdError::Validation(_)));
        assert_eq!(upload_count(&h.uploads), 0);
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let h = harness(StubClassifier::predicting("Healthy"), StoreFailures::default()).await;

        let outcome = h
            .orchestrator
            .submit_upload(Some(owner()), Some(cow_photo()))
            .await
            .unwrap();

        assert_eq!(outcome.record.status(), AnalysisStatus::Analyzed);
        assert_eq!(
            outcome.record.analysis_result().unwrap().predicted_class(),
            Some("Healthy")
        );
        assert!(outcome.analysis_error.is_none());
        assert!(outcome.storage_error.is_none());

        // Classifier saw the stored file
        assert_eq!(h.classifier.paths(), vec![outcome.record.storage_path.clone()]);
        assert!(outcome.record.storage_path.exists());

        let stored = h.records.list_for_owner(&owner()).await.unwrap();
        assert_eq!(stored, vec![outcome.record]);
    }

    #[tokio::test]
    async fn test_classifier_failure_keeps_upload() {
        let h = harness(
            StubClassifier::failing(ClassificationError::Unreachable(
                "connection refused".to_string(),
            )),
            StoreFailures::default(),
        )
        .await;

        let outcome = h
            .orchestrator
            .submit_upload(Some(owner()), Some(cow_photo()))
            .await
            .unwrap();

        assert_eq!(outcome.record.status(), AnalysisStatus::Error);
        assert!(outcome.record.analysis_result().is_none());
        assert!(matches!(
            outcome.analysis_error,
            Some(ClassificationError::Unreachable(_))
        ));
        assert_eq!(h.classifier.calls(), 1);

        let stored = h.records.get(&owner(), outcome.record.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), AnalysisStatus::Error);
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal_and_cleans_up() {
        let h = harness(
            StubClassifier::predicting("healthy"),
            StoreFailures {
                create: true,
                ..Default::default()
            },
        )
        .await;

        let err = h
            .orchestrator
            .submit_upload(Some(owner()), Some(cow_photo()))
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::Storage(_)));
        assert_eq!(upload_count(&h.uploads), 0);
        assert_eq!(h.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_failure_is_reported_not_fatal() {
        let h = harness(
            StubClassifier::predicting("Mange"),
            StoreFailures {
                resolve: true,
                ..Default::default()
            },
        )
        .await;

        let outcome = h
            .orchestrator
            .submit_upload(Some(owner()), Some(cow_photo()))
            .await
            .unwrap();

        assert!(outcome.storage_error.is_some());
        assert!(outcome.analysis_error.is_none());
        assert_eq!(outcome.record.status(), AnalysisStatus::Pending);

        let stored = h.records.get(&owner(), outcome.record.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), AnalysisStatus::Pending);
        assert!(stored.storage_path.exists());
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_classifier_status() {
        let h = harness(
            StubClassifier::failing(ClassificationError::Upstream {
                status: 503,
                message: "Model not loaded".to_string(),
            }),
            StoreFailures::default(),
        )
        .await;

        let outcome = h
            .orchestrator
            .submit_upload(Some(owner()), Some(cow_photo()))
            .await
            .unwrap();

        assert_eq!(outcome.record.status(), AnalysisStatus::Error);
        let error = outcome.analysis_error.unwrap();
        assert_eq!(error.status(), Some(503));
        assert_eq!(error.to_string(), "Classifier returned 503: Model not loaded");
    }
}

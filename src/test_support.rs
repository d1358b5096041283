/// Shared fakes and helpers for unit tests
use crate::{
    classifier::{AnalysisOutcome, ClassificationError, Classifier, ModelInfo},
    error::{HerdError, HerdResult},
    file_store::StoredFile,
    records::{ImageRecord, OwnerId, RecordStore, TerminalState},
};
use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use uuid::Uuid;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Classifier answering every call with the same outcome
pub struct StubClassifier {
    outcome: AnalysisOutcome,
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl StubClassifier {
    pub fn predicting(label: &str) -> Self {
        let result = serde_json::from_value(json!({
            "predicted_class": label,
            "confidence": 0.9,
        }))
        .unwrap();
        Self::with_outcome(Ok(result))
    }

    pub fn failing(error: ClassificationError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: AnalysisOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, storage_path: &Path) -> AnalysisOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(storage_path.to_path_buf());
        self.outcome.clone()
    }

    async fn model_info(&self) -> Result<ModelInfo, ClassificationError> {
        match &self.outcome {
            Ok(_) => Ok(ModelInfo {
                model_loaded: true,
                class_names: None,
            }),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Which record store operations should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFailures {
    pub create: bool,
    pub resolve: bool,
    pub list: bool,
}

/// Wraps a real store and injects failures
pub struct FlakyRecordStore<S> {
    inner: S,
    failures: StoreFailures,
}

impl<S> FlakyRecordStore<S> {
    pub fn new(inner: S, failures: StoreFailures) -> Self {
        Self { inner, failures }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FlakyRecordStore<S> {
    async fn create(&self, owner: &OwnerId, file: &StoredFile) -> HerdResult<ImageRecord> {
        if self.failures.create {
            return Err(HerdError::Storage("database is locked".to_string()));
        }
        self.inner.create(owner, file).await
    }

    async fn resolve(
        &self,
        owner: &OwnerId,
        id: Uuid,
        state: TerminalState,
    ) -> HerdResult<ImageRecord> {
        if self.failures.resolve {
            return Err(HerdError::Storage("disk I/O error".to_string()));
        }
        self.inner.resolve(owner, id, state).await
    }

    async fn get(&self, owner: &OwnerId, id: Uuid) -> HerdResult<Option<ImageRecord>> {
        self.inner.get(owner, id).await
    }

    async fn list_for_owner(&self, owner: &OwnerId) -> HerdResult<Vec<ImageRecord>> {
        if self.failures.list {
            return Err(HerdError::Storage("no such table: images".to_string()));
        }
        self.inner.list_for_owner(owner).await
    }

    async fn ping(&self) -> HerdResult<()> {
        self.inner.ping().await
    }
}

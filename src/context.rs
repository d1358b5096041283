/// Application context and dependency injection
use crate::{
    classifier::{Classifier, HttpClassifier},
    config::ServerConfig,
    db,
    error::{HerdError, HerdResult},
    file_store::{DiskFileStore, FileStore},
    records::{RecordStore, SqliteRecordStore},
    stats::StatsAggregator,
    upload::UploadOrchestrator,
};
use std::sync::Arc;
use std::time::Instant;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub records: Arc<dyn RecordStore>,
    pub classifier: Arc<dyn Classifier>,
    pub uploads: UploadOrchestrator,
    pub stats: StatsAggregator,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> HerdResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize database
        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(pool));
        let files: Arc<dyn FileStore> =
            Arc::new(DiskFileStore::new(config.storage.upload_directory.clone()));
        let classifier: Arc<dyn Classifier> = Arc::new(HttpClassifier::new(&config.classifier)?);

        tracing::info!(
            "Classifier endpoint {} (timeout {}s)",
            config.classifier.predict_url(),
            config.classifier.timeout_secs
        );

        Ok(Self::from_parts(config, records, files, classifier))
    }

    /// Assemble a context from already constructed services
    pub fn from_parts(
        config: ServerConfig,
        records: Arc<dyn RecordStore>,
        files: Arc<dyn FileStore>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let uploads = UploadOrchestrator::new(
            Arc::clone(&records),
            files,
            Arc::clone(&classifier),
            config.service.upload_limit,
        );
        let stats = StatsAggregator::new(Arc::clone(&records));

        Self {
            config: Arc::new(config),
            records,
            classifier,
            uploads,
            stats,
            started_at: Instant::now(),
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> HerdResult<()> {
        let dirs = [
            &config.storage.data_directory,
            &config.storage.upload_directory,
        ];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    HerdError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

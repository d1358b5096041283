/// SQLite-backed image record store
use crate::{
    error::{HerdError, HerdResult},
    file_store::StoredFile,
    records::{AnalysisResult, AnalysisStatus, ImageRecord, OwnerId, RecordState, RecordStore, TerminalState},
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::path::PathBuf;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, owner_id, filename, original_name, storage_path, size_bytes, \
     mime_type, upload_date, status, analysis_result";

/// Record store on the service database
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a record as-is, including its upload date and state
    pub async fn insert(&self, record: &ImageRecord) -> HerdResult<()> {
        let analysis_result = record
            .analysis_result()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| HerdError::Storage(format!("Failed to encode analysis result: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO images (id, owner_id, filename, original_name, storage_path, size_bytes,
                                mime_type, upload_date, status, analysis_result)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.owner_id.as_str())
        .bind(&record.filename)
        .bind(&record.original_name)
        .bind(record.storage_path.to_string_lossy().into_owned())
        .bind(record.size_bytes)
        .bind(&record.mime_type)
        .bind(format_timestamp(&record.upload_date))
        .bind(record.status().as_str())
        .bind(analysis_result)
        .execute(&self.db)
        .await
        .map_err(|e| HerdError::Storage(format!("Failed to insert image record: {}", e)))?;

        Ok(())
    }
}

/// Fixed-width UTC timestamps so text order matches time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_record(row: &SqliteRow) -> HerdResult<ImageRecord> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| HerdError::Storage(format!("Invalid image id {}: {}", id, e)))?;

    let upload_date: String = row.try_get("upload_date")?;
    let upload_date = DateTime::parse_from_rfc3339(&upload_date)
        .map_err(|e| HerdError::Storage(format!("Invalid upload date {}: {}", upload_date, e)))?
        .with_timezone(&Utc);

    let status: String = row.try_get("status")?;
    let state = match AnalysisStatus::from_str(&status)? {
        AnalysisStatus::Pending => RecordState::Pending,
        AnalysisStatus::Error => RecordState::Error,
        AnalysisStatus::Analyzed => {
            let raw: Option<String> = row.try_get("analysis_result")?;
            RecordState::Analyzed(parse_analysis_result(id, raw.as_deref()))
        }
    };

    let storage_path: String = row.try_get("storage_path")?;

    Ok(ImageRecord {
        id,
        owner_id: OwnerId::new(row.try_get::<String, _>("owner_id")?)?,
        filename: row.try_get("filename")?,
        original_name: row.try_get("original_name")?,
        storage_path: PathBuf::from(storage_path),
        size_bytes: row.try_get("size_bytes")?,
        mime_type: row.try_get("mime_type")?,
        upload_date,
        state,
    })
}

/// Unreadable payloads degrade to an empty result instead of failing reads
fn parse_analysis_result(id: Uuid, raw: Option<&str>) -> AnalysisResult {
    match raw.map(serde_json::from_str::<AnalysisResult>) {
        Some(Ok(result)) => result,
        Some(Err(e)) => {
            tracing::warn!("Unreadable analysis result for image {}: {}", id, e);
            AnalysisResult::from_map(Default::default())
        }
        None => {
            tracing::warn!("Analyzed image {} has no stored analysis result", id);
            AnalysisResult::from_map(Default::default())
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, owner: &OwnerId, file: &StoredFile) -> HerdResult<ImageRecord> {
        let record = ImageRecord::pending(owner.clone(), file, Utc::now().trunc_subsecs(6));
        self.insert(&record).await?;

        tracing::debug!("Created pending image record {} for {}", record.id, owner);

        Ok(record)
    }

    async fn resolve(
        &self,
        owner: &OwnerId,
        id: Uuid,
        state: TerminalState,
    ) -> HerdResult<ImageRecord> {
        let state = RecordState::from(state);
        let analysis_result = state
            .analysis_result()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| HerdError::Storage(format!("Failed to encode analysis result: {}", e)))?;

        // Only a pending record may transition
        let row = sqlx::query(&format!(
            "UPDATE images SET status = ?, analysis_result = ? \
             WHERE id = ? AND owner_id = ? AND status = 'pending' \
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(state.status().as_str())
        .bind(analysis_result)
        .bind(id.to_string())
        .bind(owner.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| HerdError::Storage(format!("Failed to update image record {}: {}", id, e)))?;

        match row {
            Some(row) => row_to_record(&row),
            None => match self.get(owner, id).await? {
                Some(existing) => Err(HerdError::Storage(format!(
                    "Image record {} is already {}",
                    id,
                    existing.status().as_str()
                ))),
                None => Err(HerdError::NotFound(format!("Image record {}", id))),
            },
        }
    }

    async fn get(&self, owner: &OwnerId, id: Uuid) -> HerdResult<Option<ImageRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM images WHERE id = ? AND owner_id = ?",
            SELECT_COLUMNS
        ))
        .bind(id.to_string())
        .bind(owner.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| HerdError::Storage(format!("Failed to load image record {}: {}", id, e)))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list_for_owner(&self, owner: &OwnerId) -> HerdResult<Vec<ImageRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM images WHERE owner_id = ? ORDER BY upload_date DESC, id",
            SELECT_COLUMNS
        ))
        .bind(owner.as_str())
        .fetch_all(&self.db)
        .await
        .map_err(|e| HerdError::Storage(format!("Failed to list image records: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn ping(&self) -> HerdResult<()> {
        crate::db::test_connection(&self.db).await
    }
}

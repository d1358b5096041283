/// Image record persistence
///
/// One record per uploaded image. Records are created pending, resolved
/// exactly once to `analyzed` or `error`, and always accessed through the
/// owner they belong to.

pub mod models;
pub mod store;

pub use models::*;
pub use store::SqliteRecordStore;

use crate::{error::HerdResult, file_store::StoredFile};
use async_trait::async_trait;
use uuid::Uuid;

/// Record storage trait
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a pending record for a stored file
    async fn create(&self, owner: &OwnerId, file: &StoredFile) -> HerdResult<ImageRecord>;

    /// Move a pending record to its terminal state
    ///
    /// Fails if the record is unknown to `owner` or no longer pending.
    async fn resolve(
        &self,
        owner: &OwnerId,
        id: Uuid,
        state: TerminalState,
    ) -> HerdResult<ImageRecord>;

    /// Load one record of `owner`
    async fn get(&self, owner: &OwnerId, id: Uuid) -> HerdResult<Option<ImageRecord>>;

    /// All records of `owner`, newest first
    async fn list_for_owner(&self, owner: &OwnerId) -> HerdResult<Vec<ImageRecord>>;

    /// Check the backing storage is reachable
    async fn ping(&self) -> HerdResult<()>;
}

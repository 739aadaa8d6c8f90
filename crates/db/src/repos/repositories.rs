use std::collections::HashSet;

use async_trait::async_trait;

use crate::repos::models::TrackedRecord;
use repotrack_common::error::RepotrackResult;

#[async_trait]
pub trait TrackedRepoStore: Send + Sync {
    /// Create the backing collection if it does not exist yet.
    /// Returns `true` when it was created by this call; an existing collection is not an error.
    async fn ensure_collection(&self) -> RepotrackResult<bool>;

    /// Return the subset of `names` already stored. Empty input yields empty output.
    async fn find_existing_keys(&self, names: &HashSet<String>) -> RepotrackResult<HashSet<String>>;

    /// Insert the record, or overwrite the synced fields of the row with the same name.
    /// `versions` is only written on insert.
    ///
    /// Fails with `Conflict` when this record alone is rejected, `StorageUnavailable` otherwise.
    async fn upsert(&self, record: &TrackedRecord) -> RepotrackResult<()>;
}

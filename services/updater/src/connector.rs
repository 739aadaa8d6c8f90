use async_trait::async_trait;
use chrono::{DateTime, Utc};

use repotrack_common::error::RepotrackResult;

/// One remote repository as seen during a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ResourceClient: Send + Sync {
    fn source_name(&self) -> &str;

    /// List remote resources. When `since` is given, implementations should return only
    /// resources updated strictly after it, but may return more.
    ///
    /// Any failure is reported as `RemoteUnavailable`.
    async fn list(&self, since: Option<DateTime<Utc>>) -> RepotrackResult<Vec<RemoteResource>>;
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub source: String,
    pub listed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub conflicts: usize,
    pub watermark: Option<DateTime<Utc>>,
}

impl CycleReport {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_owned(),
            listed: 0,
            inserted: 0,
            updated: 0,
            conflicts: 0,
            watermark: None,
        }
    }

    /// Number of records written to the store this cycle.
    pub fn upserted(&self) -> usize {
        self.inserted + self.updated
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connector::RemoteResource;

/// A repository record from the GitHub REST API (`GET /orgs/{org}/repos`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    /// `null` for repositories that never received a push.
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<GitHubRepo> for RemoteResource {
    fn from(repo: GitHubRepo) -> Self {
        Self {
            name: repo.name,
            description: repo.description,
            html_url: repo.html_url,
            pushed_at: repo.pushed_at,
            updated_at: repo.updated_at,
        }
    }
}

pub mod fixtures;
pub mod repos;

use repotrack_common::error::{RepotrackError, RepotrackResult};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Create a Postgres connection pool.
pub async fn create_pool(options: PgConnectOptions) -> RepotrackResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| RepotrackError::StorageUnavailable(e.to_string()))
}

use anyhow::Context;

use repotrack_common::error::RepotrackError;
use repotrack_config::{init_tracing, AppConfig};
use repotrack_db::fixtures::sample_records;
use repotrack_db::repos::pg_repository::PgTrackedRepoStore;
use repotrack_db::repos::repositories::TrackedRepoStore;

const FIXTURE_COUNT: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = AppConfig::from_env().context("failed to load config")?;
    tracing::info!(service = "repotrack-seed", "starting");

    let pool = repotrack_db::create_pool(config.database.connect_options()?)
        .await
        .context("failed to connect to database")?;
    let store = PgTrackedRepoStore::new(pool.clone(), &config.repositories_table)?;

    if store.ensure_collection().await? {
        tracing::info!(table = store.table(), "created table");
    }

    let mut written = 0;
    for record in sample_records(FIXTURE_COUNT) {
        match store.upsert(&record).await {
            Ok(()) => written += 1,
            Err(RepotrackError::Conflict { name, reason }) => {
                tracing::warn!(repo = %name, %reason, "skipping fixture");
            }
            Err(e) => return Err(e.into()),
        }
    }

    pool.close().await;
    tracing::info!(written, table = %config.repositories_table, "seed completed");
    Ok(())
}

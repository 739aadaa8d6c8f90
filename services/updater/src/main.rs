mod connector;
mod github;
mod reconciler;
mod scheduler;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use repotrack_common::types::ServiceInfo;
use repotrack_config::{init_tracing, AppConfig};
use repotrack_db::repos::models::Versions;
use repotrack_db::repos::pg_repository::PgTrackedRepoStore;
use repotrack_db::repos::repositories::TrackedRepoStore;

use crate::github::client::{GitHubClient, GitHubClientConfig};
use crate::reconciler::Reconciler;
use crate::scheduler::Scheduler;

const SERVICE_NAME: &str = "repotrack-updater";

/// Keeps the local repositories table in sync with a GitHub organisation.
#[derive(Debug, Parser)]
#[command(name = SERVICE_NAME, version)]
struct Cli {
    /// Print lots of debugging statements
    #[arg(short, long)]
    debug: bool,

    /// Be verbose
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let info = ServiceInfo::new(SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    tracing::info!(
        service = %info.name,
        version = %info.version,
        instance_id = %info.instance_id,
        "starting"
    );

    let config = AppConfig::from_env().context("failed to load config")?;
    let github_config = GitHubClientConfig::from_env().context("invalid github configuration")?;

    let pool = repotrack_db::create_pool(config.database.connect_options()?)
        .await
        .context("failed to connect to database")?;
    let store = PgTrackedRepoStore::new(pool.clone(), &config.repositories_table)?;

    let created = store
        .ensure_collection()
        .await
        .context("failed to prepare repositories table")?;
    if created {
        tracing::info!(table = store.table(), "created table");
    } else {
        tracing::info!(table = store.table(), "table already exists");
    }

    tracing::info!(
        organisation = %github_config.organisation,
        interval_secs = config.scan_interval_secs,
        "github connector configured"
    );
    let client = GitHubClient::new(github_config).context("failed to create github client")?;

    let reconciler = Reconciler::new(client, store, Versions::from(config.default_versions.clone()));
    let mut scheduler = Scheduler::new(reconciler, config.scan_interval());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, finishing current cycle");
                    cancel.cancel();
                }
                Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
            }
        });
    }

    scheduler.run(&cancel).await;

    pool.close().await;
    tracing::info!("shutting down");
    Ok(())
}

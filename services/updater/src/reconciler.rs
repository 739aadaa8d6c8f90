use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::connector::{CycleReport, RemoteResource, ResourceClient};
use repotrack_common::error::{RepotrackError, RepotrackResult};
use repotrack_db::repos::models::{TrackedRecord, Versions};
use repotrack_db::repos::repositories::TrackedRepoStore;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Brings the store in line with the remote listing, one cycle at a time.
///
/// The watermark is the start time of the last successful cycle. It only ever moves
/// forward and is left untouched when a cycle aborts, so the next cycle asks for the
/// same window again.
pub struct Reconciler<C, S> {
    client: C,
    store: S,
    clock: Box<dyn Clock>,
    default_versions: Versions,
    watermark: Option<DateTime<Utc>>,
}

impl<C, S> Reconciler<C, S>
where
    C: ResourceClient,
    S: TrackedRepoStore,
{
    pub fn new(client: C, store: S, default_versions: Versions) -> Self {
        Self {
            client,
            store,
            clock: Box::new(SystemClock),
            default_versions,
            watermark: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run one scan.
    ///
    /// `RemoteUnavailable` and `StorageUnavailable` abort the cycle; a `Conflict` on a single
    /// record is counted in the report and skipped.
    pub async fn run_cycle(&mut self) -> RepotrackResult<CycleReport> {
        let cycle_start = self.clock.now();
        let since = self.watermark;
        let mut report = CycleReport::new(self.client.source_name());

        let listed = self.client.list(since).await?;
        let changed = changed_since(listed, since);
        report.listed = changed.len();

        if !changed.is_empty() {
            let names: HashSet<String> = changed.keys().cloned().collect();
            let existing = self.store.find_existing_keys(&names).await?;

            for (name, resource) in &changed {
                let is_update = existing.contains(name);
                let record = self.to_record(resource);

                match self.store.upsert(&record).await {
                    Ok(()) if is_update => {
                        tracing::debug!(repo = %name, "updated repository");
                        report.updated += 1;
                    }
                    Ok(()) => {
                        tracing::debug!(repo = %name, "inserted repository");
                        report.inserted += 1;
                    }
                    Err(RepotrackError::Conflict { name, reason }) => {
                        tracing::info!(repo = %name, %reason, "skipping repository after conflict");
                        report.conflicts += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let committed = since.map_or(cycle_start, |previous| previous.max(cycle_start));
        self.watermark = Some(committed);
        report.watermark = Some(committed);
        Ok(report)
    }

    fn to_record(&self, resource: &RemoteResource) -> TrackedRecord {
        let now = Utc::now();
        TrackedRecord {
            id: Uuid::new_v4(),
            name: resource.name.clone(),
            description: resource.description.clone(),
            html_url: resource.html_url.clone(),
            pushed_at: resource.pushed_at,
            updated_at: resource.updated_at,
            versions: self.default_versions.clone(),
            created_at: now,
            synced_at: now,
        }
    }
}

/// Keep resources updated after `since`, one per name (the most recently updated wins).
fn changed_since(
    listed: Vec<RemoteResource>,
    since: Option<DateTime<Utc>>,
) -> BTreeMap<String, RemoteResource> {
    let mut changed: BTreeMap<String, RemoteResource> = BTreeMap::new();
    for resource in listed {
        if since.is_some_and(|since| resource.updated_at <= since) {
            continue;
        }
        match changed.get(&resource.name) {
            Some(seen) if seen.updated_at >= resource.updated_at => {}
            _ => {
                changed.insert(resource.name.clone(), resource);
            }
        }
    }
    changed
}

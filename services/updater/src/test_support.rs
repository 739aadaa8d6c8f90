//! In-memory doubles for the remote client, the store and the clock.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::connector::{RemoteResource, ResourceClient};
use crate::reconciler::Clock;
use repotrack_common::error::{RepotrackError, RepotrackResult};
use repotrack_db::repos::models::{TrackedRecord, Versions};
use repotrack_db::repos::repositories::TrackedRepoStore;

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
}

pub fn resource(name: &str, updated_at: DateTime<Utc>) -> RemoteResource {
    RemoteResource {
        name: name.to_string(),
        description: Some(format!("{name} service")),
        html_url: format!("https://github.com/acme/{name}"),
        pushed_at: Some(updated_at),
        updated_at,
    }
}

// -- Clock --

#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// -- Mock ResourceClient --

#[derive(Default)]
struct ClientState {
    resources: Vec<RemoteResource>,
    fail_next: usize,
    panic_next: bool,
    calls: Vec<Option<DateTime<Utc>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

/// Returns the full listing on every call and leaves filtering to the reconciler.
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<ClientState>>,
}

impl MockClient {
    pub fn with_resources(resources: Vec<RemoteResource>) -> Self {
        let client = Self::default();
        client.set_resources(resources);
        client
    }

    pub fn set_resources(&self, resources: Vec<RemoteResource>) {
        self.state.lock().unwrap().resources = resources;
    }

    pub fn fail_next(&self, times: usize) {
        self.state.lock().unwrap().fail_next = times;
    }

    pub fn panic_next(&self) {
        self.state.lock().unwrap().panic_next = true;
    }

    /// Cancel `token` once `calls` list requests have been served.
    pub fn cancel_after(&self, calls: usize, token: CancellationToken) {
        self.state.lock().unwrap().cancel_after = Some((calls, token));
    }

    pub fn calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ResourceClient for MockClient {
    fn source_name(&self) -> &str {
        "mock"
    }

    async fn list(&self, since: Option<DateTime<Utc>>) -> RepotrackResult<Vec<RemoteResource>> {
        let (outcome, should_panic) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(since);
            let served = state.calls.len();
            if let Some((limit, token)) = &state.cancel_after {
                if served >= *limit {
                    token.cancel();
                }
            }

            if state.panic_next {
                state.panic_next = false;
                (Ok(Vec::new()), true)
            } else if state.fail_next > 0 {
                state.fail_next -= 1;
                (
                    Err(RepotrackError::RemoteUnavailable("connection refused".to_string())),
                    false,
                )
            } else {
                (Ok(state.resources.clone()), false)
            }
        };

        if should_panic {
            panic!("mock client exploded");
        }
        outcome
    }
}

// -- Mock TrackedRepoStore --

#[derive(Default)]
struct StoreState {
    records: BTreeMap<String, TrackedRecord>,
    conflicts: HashSet<String>,
    unavailable: bool,
    unavailable_on: HashSet<String>,
    upserts: usize,
    lookups: usize,
}

/// Applies the same insert/update split as the Postgres store.
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, versions: Versions) {
        let now = Utc::now();
        let record = TrackedRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            html_url: format!("https://github.com/acme/{name}"),
            pushed_at: None,
            updated_at: ts(1),
            versions,
            created_at: now,
            synced_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .records
            .insert(name.to_string(), record);
    }

    pub fn conflict_on(&self, name: &str) {
        self.state.lock().unwrap().conflicts.insert(name.to_string());
    }

    /// Fail `upsert` for `name` as if the database went away mid-cycle.
    pub fn unavailable_on(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .unavailable_on
            .insert(name.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn record(&self, name: &str) -> Option<TrackedRecord> {
        self.state.lock().unwrap().records.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn upserts(&self) -> usize {
        self.state.lock().unwrap().upserts
    }

    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }
}

#[async_trait]
impl TrackedRepoStore for MockStore {
    async fn ensure_collection(&self) -> RepotrackResult<bool> {
        Ok(false)
    }

    async fn find_existing_keys(&self, names: &HashSet<String>) -> RepotrackResult<HashSet<String>> {
        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(RepotrackError::StorageUnavailable("connection reset".to_string()));
        }
        state.lookups += 1;
        Ok(names
            .iter()
            .filter(|name| state.records.contains_key(*name))
            .cloned()
            .collect())
    }

    async fn upsert(&self, record: &TrackedRecord) -> RepotrackResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.unavailable || state.unavailable_on.contains(&record.name) {
            return Err(RepotrackError::StorageUnavailable("connection reset".to_string()));
        }
        state.upserts += 1;
        if state.conflicts.contains(&record.name) {
            return Err(RepotrackError::Conflict {
                name: record.name.clone(),
                reason: "duplicate key value".to_string(),
            });
        }

        match state.records.get_mut(&record.name) {
            Some(existing) => {
                existing.description = record.description.clone();
                existing.html_url = record.html_url.clone();
                existing.pushed_at = record.pushed_at;
                existing.updated_at = record.updated_at;
                existing.synced_at = Utc::now();
            }
            None => {
                state.records.insert(record.name.clone(), record.clone());
            }
        }
        Ok(())
    }
}

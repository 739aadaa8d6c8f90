use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operator-managed version metadata, e.g. `production -> 1.2.3`.
///
/// Keys are release channels and are not constrained; the reconciler only ever writes the
/// configured defaults on first insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Versions(BTreeMap<String, String>);

impl Versions {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, channel: &str) -> Option<&str> {
        self.0.get(channel).map(String::as_str)
    }
}

impl From<BTreeMap<String, String>> for Versions {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Versions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A repository row as persisted locally. `name` is unique and correlates the row with the
/// remote resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub versions: Versions,
    pub created_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

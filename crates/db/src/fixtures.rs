//! Fixture rows for local development databases.

use chrono::Utc;
use uuid::Uuid;

use crate::repos::models::{TrackedRecord, Versions};

const FEATURE_BRANCHES: [&str; 4] = ["backend", "db", "kubernetes", "cooladata"];

/// Build `count` sample records named `Project #0`, `Project #1`, ...
pub fn sample_records(count: usize) -> Vec<TrackedRecord> {
    let now = Utc::now();
    (0..count)
        .map(|i| TrackedRecord {
            id: Uuid::new_v4(),
            name: format!("Project #{i}"),
            description: None,
            html_url: format!("https://example.invalid/projects/{i}"),
            pushed_at: None,
            updated_at: now,
            versions: sample_versions(i),
            created_at: now,
            synced_at: now,
        })
        .collect()
}

fn sample_versions(i: usize) -> Versions {
    let branch = FEATURE_BRANCHES[i % FEATURE_BRANCHES.len()];
    [
        ("production".to_owned(), format!("1.2.{i}")),
        ("staging".to_owned(), format!("1.{}", i + 1)),
        ("testing".to_owned(), format!("0.0.0-feature-{branch}")),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_requested_count_with_unique_names() {
        let records = sample_records(10);
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].name, "Project #0");
        assert_eq!(records[9].name, "Project #9");

        let names: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn versions_follow_channel_pattern() {
        let records = sample_records(6);
        let fifth = &records[5].versions;
        assert_eq!(fifth.get("production"), Some("1.2.5"));
        assert_eq!(fifth.get("staging"), Some("1.6"));
        assert_eq!(fifth.get("testing"), Some("0.0.0-feature-db"));
        assert_eq!(
            records[3].versions.get("testing"),
            Some("0.0.0-feature-cooladata")
        );
    }
}

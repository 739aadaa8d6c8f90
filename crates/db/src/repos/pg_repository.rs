use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::repos::models::TrackedRecord;
use crate::repos::repositories::TrackedRepoStore;
use repotrack_common::error::{RepotrackError, RepotrackResult};

const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Clone)]
pub struct PgTrackedRepoStore {
    pool: PgPool,
    table: String,
}

impl PgTrackedRepoStore {
    /// The table name is interpolated into SQL unquoted, so it must be a plain lowercase
    /// identifier (Postgres folds unquoted names to lowercase).
    pub fn new(pool: PgPool, table: &str) -> RepotrackResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_owned(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl TrackedRepoStore for PgTrackedRepoStore {
    async fn ensure_collection(&self) -> RepotrackResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "select exists (
               select 1 from information_schema.tables
               where table_schema = current_schema() and table_name = $1
             )",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(None, e))?;

        sqlx::query(&format!(
            "create table if not exists {} (
               id uuid primary key,
               name text not null unique,
               description text,
               html_url text not null,
               pushed_at timestamptz,
               updated_at timestamptz not null,
               versions jsonb not null default '{{}}'::jsonb,
               created_at timestamptz not null default now(),
               synced_at timestamptz not null default now()
             )",
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(None, e))?;

        Ok(!exists)
    }

    async fn find_existing_keys(&self, names: &HashSet<String>) -> RepotrackResult<HashSet<String>> {
        if names.is_empty() {
            return Ok(HashSet::new());
        }

        let candidates: Vec<String> = names.iter().cloned().collect();
        let rows = sqlx::query(&format!(
            "select name from {} where name = any($1)",
            self.table
        ))
        .bind(&candidates)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(None, e))?;

        rows.into_iter()
            .map(|row| row.try_get("name"))
            .collect::<Result<HashSet<String>, _>>()
            .map_err(|e| map_sqlx_error(None, e))
    }

    async fn upsert(&self, record: &TrackedRecord) -> RepotrackResult<()> {
        sqlx::query(&format!(
            "insert into {} (id, name, description, html_url, pushed_at, updated_at, versions)
             values ($1, $2, $3, $4, $5, $6, $7)
             on conflict (name) do update set
               description = excluded.description,
               html_url = excluded.html_url,
               pushed_at = excluded.pushed_at,
               updated_at = excluded.updated_at,
               synced_at = now()",
            self.table
        ))
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.html_url)
        .bind(record.pushed_at)
        .bind(record.updated_at)
        .bind(Json(&record.versions))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(Some(&record.name), e))?;
        Ok(())
    }
}

fn validate_identifier(table: &str) -> RepotrackResult<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && table.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(RepotrackError::Validation(format!(
            "invalid table name {table:?}"
        )))
    }
}

/// Integrity (23xxx) and data (22xxx) errors reject one record; everything else means the
/// database itself is not usable right now.
fn map_sqlx_error(name: Option<&str>, err: sqlx::Error) -> RepotrackError {
    let sqlstate = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match (name, sqlstate.as_deref()) {
        (Some(name), Some(code)) if code.starts_with("23") || code.starts_with("22") => {
            RepotrackError::Conflict {
                name: name.to_owned(),
                reason: err.to_string(),
            }
        }
        _ => RepotrackError::StorageUnavailable(err.to_string()),
    }
}

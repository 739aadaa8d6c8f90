use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use repotrack_common::error::{RepotrackError, RepotrackResult};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

const DEFAULT_VERSIONS_JSON: &str =
    r#"{"production":"1.2.3","staging":"1.3","testing":"0.0.0-feature-hello"}"#;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
}

impl DatabaseConfig {
    /// `DATABASE_URL` verbatim when given, otherwise built from the parts. Credentials are
    /// passed as options rather than spliced into a URL, so they need no escaping.
    pub fn connect_options(&self) -> RepotrackResult<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url
                .parse()
                .map_err(|e| RepotrackError::Config(format!("invalid DATABASE_URL: {e}")));
        }

        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);
        Ok(match &self.password {
            Some(password) => options.password(password),
            None => options,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub repositories_table: String,
    pub scan_interval_secs: u64,
    pub default_versions: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads the optional overrides.
    pub fn from_env() -> RepotrackResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let scan_interval_secs: u64 = get_var_or("SCAN_INTERVAL_SECS", "300")
            .parse()
            .map_err(|e| RepotrackError::Config(format!("invalid SCAN_INTERVAL_SECS: {e}")))?;
        if scan_interval_secs == 0 {
            return Err(RepotrackError::Config(
                "SCAN_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        let versions_raw = get_var_or("DEFAULT_VERSIONS", DEFAULT_VERSIONS_JSON);
        let default_versions = serde_json::from_str(&versions_raw)
            .map_err(|e| RepotrackError::Config(format!("invalid DEFAULT_VERSIONS: {e}")))?;

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok(),
                host: get_var_or("DB_HOST", "localhost"),
                port: get_var_or("DB_PORT", "5432")
                    .parse()
                    .map_err(|e| RepotrackError::Config(format!("invalid DB_PORT: {e}")))?,
                name: get_var_or("DB_NAME", "repotrack"),
                user: get_var_or("DB_USER", "postgres"),
                password: env::var("DB_PASSWORD").ok(),
            },
            repositories_table: get_var_or("REPOSITORIES_TABLE", "repositories"),
            scan_interval_secs,
            default_versions,
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

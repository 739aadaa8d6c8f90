use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use super::models::GitHubRepo;
use crate::connector::{RemoteResource, ResourceClient};
use repotrack_common::error::{RepotrackError, RepotrackResult};

const SOURCE_NAME: &str = "github";
const PER_PAGE: u32 = 100;
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 60;
const MAX_BACKOFF_SECS: u64 = 30;
const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubAuth {
    Anonymous,
    Token(String),
    /// OAuth app credentials, sent as HTTP basic auth.
    App {
        client_id: String,
        client_secret: String,
    },
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub base_url: String,
    pub organisation: String,
    pub auth: GitHubAuth,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl GitHubClientConfig {
    /// Load GitHub config from environment.
    ///
    /// `GITHUB_TOKEN` wins over app credentials. Setting only one of `GITHUB_CLIENT_ID` /
    /// `GITHUB_CLIENT_SECRET` is a configuration error.
    pub fn from_env() -> RepotrackResult<Self> {
        let token = non_empty_var("GITHUB_TOKEN");
        let client_id = non_empty_var("GITHUB_CLIENT_ID");
        let client_secret = non_empty_var("GITHUB_CLIENT_SECRET");

        let auth = match (token, client_id, client_secret) {
            (Some(token), _, _) => GitHubAuth::Token(token),
            (None, Some(client_id), Some(client_secret)) => GitHubAuth::App {
                client_id,
                client_secret,
            },
            (None, None, None) => GitHubAuth::Anonymous,
            (None, _, _) => {
                return Err(RepotrackError::Config(
                    "GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET must be set together".to_string(),
                ))
            }
        };

        let max_retries = std::env::var("GITHUB_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3)
            .min(MAX_RETRIES_LIMIT);
        let timeout_secs = std::env::var("GITHUB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            base_url: non_empty_var("GITHUB_API_URL")
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            organisation: non_empty_var("GITHUB_ORGANISATION")
                .unwrap_or_else(|| "ConnectedVentures".to_string()),
            auth,
            max_retries,
            timeout_secs,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum GitHubClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repotrack-updater/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    /// Fetch organisation repositories updated after `since` (all of them when `None`).
    ///
    /// Pages are requested newest-update first, so paging stops at the first page that
    /// reaches a repository not newer than `since`.
    pub async fn fetch_org_repos(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GitHubRepo>, GitHubClientError> {
        let mut url = format!(
            "{}/orgs/{}/repos?per_page={}&sort=updated&direction=desc",
            self.config.base_url, self.config.organisation, PER_PAGE
        );
        let mut all_repos = Vec::new();

        loop {
            let (repos, next_page) = self.request_with_retry(&url).await?;

            let mut reached_older = false;
            for repo in repos {
                match since {
                    Some(since) if repo.updated_at <= since => reached_older = true,
                    _ => all_repos.push(repo),
                }
            }

            match next_page {
                Some(next) if !reached_older => url = next,
                _ => break,
            }
        }

        Ok(all_repos)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            GitHubAuth::Anonymous => request,
            GitHubAuth::Token(token) => request.bearer_auth(token),
            GitHubAuth::App {
                client_id,
                client_secret,
            } => request.basic_auth(client_id, Some(client_secret)),
        }
    }

    async fn request_with_retry(
        &self,
        url: &str,
    ) -> Result<(Vec<GitHubRepo>, Option<String>), GitHubClientError> {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_secs(attempt);
                tracing::warn!(attempt, backoff_secs = delay, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            let request = self
                .client
                .get(url)
                .header("accept", "application/vnd.github+json")
                .header("x-github-api-version", "2022-11-28");

            let response = match self.authorize(request).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(GitHubClientError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                let next_page = response
                    .headers()
                    .get("link")
                    .and_then(|v| v.to_str().ok())
                    .and_then(next_link);

                let repos = response
                    .json::<Vec<GitHubRepo>>()
                    .await
                    .map_err(GitHubClientError::RequestError)?;

                return Ok((repos, next_page));
            }

            if is_rate_limited(&response) {
                let wait = rate_limit_wait_secs(&response, Utc::now());
                tracing::warn!(wait, %status, "rate-limited, waiting for reset");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                last_error = format!("{status}: rate limited");
                continue;
            }

            // Retry on 5xx
            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            // Fail fast on other 4xx
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubClientError::HttpError { status, body });
        }

        Err(GitHubClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries.saturating_add(1),
            last_error,
        })
    }
}

#[async_trait]
impl ResourceClient for GitHubClient {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list(&self, since: Option<DateTime<Utc>>) -> RepotrackResult<Vec<RemoteResource>> {
        let repos = self.fetch_org_repos(since).await.map_err(|e| {
            RepotrackError::RemoteUnavailable(format!(
                "listing repositories of {}: {e}",
                self.config.organisation
            ))
        })?;

        tracing::debug!(
            count = repos.len(),
            organisation = %self.config.organisation,
            "fetched github repositories"
        );
        Ok(repos.into_iter().map(RemoteResource::from).collect())
    }
}

/// GitHub signals exhausted quota with 429, or with 403 and `x-ratelimit-remaining: 0`.
/// `2^attempt` seconds, capped at [`MAX_BACKOFF_SECS`].
fn backoff_secs(attempt: u32) -> u64 {
    1u64.checked_shl(attempt)
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS)
}

fn is_rate_limited(response: &Response) -> bool {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

/// Seconds to wait before retrying: `retry-after` when present, otherwise the distance to
/// `x-ratelimit-reset`, capped at one minute.
fn rate_limit_wait_secs(response: &Response, now: DateTime<Utc>) -> u64 {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    let wait = header("retry-after")
        .or_else(|| header("x-ratelimit-reset").map(|reset| reset - now.timestamp()))
        .unwrap_or(0);

    u64::try_from(wait)
        .unwrap_or(0)
        .min(MAX_RATE_LIMIT_WAIT_SECS)
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        if !segments.any(|s| s.trim() == r#"rel="next""#) {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

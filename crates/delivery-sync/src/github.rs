//! GitHub REST implementation of [`IssueTracker`]

use crate::error::TrackerError;
use crate::tracker::{Issue, IssueTracker, IssueUpdate, NewIssue, Repository};
use async_trait::async_trait;
use delivery_model::RepositoryLink;
use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;
const USER_AGENT: &str = concat!("delivery-sync/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`GitHubClient`]
#[derive(Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    pub token: SecretString,
    pub timeout: Duration,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GitHubConfig {
    /// Config against the public API with a 30 second timeout
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            timeout: Duration::from_secs(30),
        }
    }

    /// With API base URL (GitHub Enterprise or a test server)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// With request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// GitHub issues client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    config: GitHubConfig,
}

impl GitHubClient {
    /// Build client
    ///
    /// # Errors
    /// [`TrackerError::Configuration`] if the base URL is empty or the HTTP
    /// client cannot be built
    pub fn new(config: GitHubConfig) -> Result<Self, TrackerError> {
        if config.api_base.trim().is_empty() {
            return Err(TrackerError::Configuration("api base URL must not be empty".into()));
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TrackerError::Configuration(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.config.token.expose_secret())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TrackerError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TrackerError::Http {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TrackerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn repository(&self, owner: &str, name: &str) -> Result<Repository, TrackerError> {
        let request = self.http.get(self.url(&format!("/repos/{owner}/{name}")));
        let response = self.authorized(request).send().await?;
        Self::decode(response).await
    }

    async fn create_issue(
        &self,
        repo: &RepositoryLink,
        issue: &NewIssue,
    ) -> Result<Issue, TrackerError> {
        let path = format!("/repos/{}/issues", repo.full_name());
        let request = self.http.post(self.url(&path)).json(issue);
        let response = self.authorized(request).send().await?;
        let created: Issue = Self::decode(response).await?;
        tracing::debug!(repo = %repo.full_name(), number = created.number, "issue created");
        Ok(created)
    }

    async fn update_issue(
        &self,
        repo: &RepositoryLink,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue, TrackerError> {
        let path = format!("/repos/{}/issues/{number}", repo.full_name());
        let request = self.http.patch(self.url(&path)).json(update);
        let response = self.authorized(request).send().await?;
        Self::decode(response).await
    }

    async fn list_issues(&self, repo: &RepositoryLink) -> Result<Vec<Issue>, TrackerError> {
        let path = format!("/repos/{}/issues", repo.full_name());
        let mut issues = Vec::new();
        let mut page = 1usize;
        loop {
            let request = self.http.get(self.url(&path)).query(&[
                ("state", "all".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
            let response = self.authorized(request).send().await?;
            let batch: Vec<Issue> = Self::decode(response).await?;
            let len = batch.len();
            issues.extend(batch);
            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        tracing::debug!(repo = %repo.full_name(), count = issues.len(), "issues listed");
        Ok(issues)
    }
}

//! HTTP clients for deploymark.
//!
//! [`GitHubClient`] implements `SourceHost` against the GitHub REST API and
//! [`JiraClient`] implements `IssueTracker` against the Atlassian cloud APIs.
//! [`HttpConnector`] builds both once credentials are known. Every method
//! issues its request once; there are no retries and only reqwest's default
//! timeouts apply.

mod github;
mod jira;

use std::sync::Arc;

use deploymark_core::{ConnectError, Connector, IssueTracker, Repository, Secret, SourceHost};

pub use github::{GitHubClient, DEFAULT_GITHUB_API_URL};
pub use jira::{JiraClient, DEFAULT_ATLASSIAN_API_URL};

pub(crate) const USER_AGENT: &str = concat!("deploymark/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Read a failed response's body for an error message, truncated.
pub(crate) async fn read_error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Builds the real HTTP clients.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    pub github_api_url: String,
    pub atlassian_api_url: String,
    pub repository: Repository,
}

impl HttpConnector {
    pub fn new(repository: Repository) -> Self {
        Self {
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            atlassian_api_url: DEFAULT_ATLASSIAN_API_URL.to_string(),
            repository,
        }
    }

    pub fn with_github_api_url(mut self, url: &str) -> Self {
        self.github_api_url = url.to_string();
        self
    }

    pub fn with_atlassian_api_url(mut self, url: &str) -> Self {
        self.atlassian_api_url = url.to_string();
        self
    }
}

impl Connector for HttpConnector {
    fn source_host(&self, token: &Secret) -> Result<Arc<dyn SourceHost>, ConnectError> {
        let client = GitHubClient::new(&self.github_api_url, self.repository.clone(), token)?;
        Ok(Arc::new(client))
    }

    fn issue_tracker(&self) -> Result<Arc<dyn IssueTracker>, ConnectError> {
        let client = JiraClient::new(&self.atlassian_api_url)?;
        Ok(Arc::new(client))
    }
}

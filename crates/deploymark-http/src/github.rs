//! GitHub REST client for commit comparison and marker tagging.

use async_trait::async_trait;
use deploymark_core::{
    CommitSummary, ConnectError, RefUpdate, Repository, Secret, SourceError, SourceHost,
    SourceResult,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{read_error_body, USER_AGENT};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Commits requested per page of a comparison.
const COMPARE_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    total_commits: usize,
    #[serde(default)]
    commits: Vec<CompareCommit>,
}

#[derive(Debug, Deserialize)]
struct CompareCommit {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateTagRequest<'a> {
    tag: &'a str,
    message: &'a str,
    object: &'a str,
    #[serde(rename = "type")]
    object_type: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

/// GitHub client scoped to one repository.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    repository: Repository,
}

impl GitHubClient {
    /// Build a client authenticated with `token`.
    pub fn new(
        api_url: &str,
        repository: Repository,
        token: &Secret,
    ) -> Result<Self, ConnectError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
            .map_err(|e| ConnectError::new("GitHub", format!("invalid token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectError::new("GitHub", e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.repository.owner, self.repository.name, path
        )
    }

    pub(crate) fn compare_url(&self, base: &str, head: &str, page: usize) -> String {
        format!(
            "{}?per_page={}&page={}",
            self.repo_url(&format!("compare/{base}...{head}")),
            COMPARE_PAGE_SIZE,
            page
        )
    }

    /// Map a failed read to a `SourceError`. A 404 becomes `RefNotFound` for
    /// `reference`.
    async fn check_read(
        response: Response,
        operation: &'static str,
        reference: &str,
    ) -> SourceResult<Response> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::RefNotFound {
                reference: reference.to_string(),
            });
        }
        Self::check_write(response, operation).await
    }

    /// Map a failed write to `SourceError::Status`. On writes a 404 usually
    /// means the token cannot write to the repository, not a missing ref.
    async fn check_write(response: Response, operation: &'static str) -> SourceResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(SourceError::Status {
            operation,
            status: status.as_u16(),
            body: read_error_body(response).await,
        })
    }

    async fn update_tag_ref(&self, tag: &str, tag_object_sha: &str) -> SourceResult<Response> {
        self.http
            .patch(self.repo_url(&format!("git/refs/tags/{tag}")))
            .json(&UpdateRefRequest {
                sha: tag_object_sha,
                force: true,
            })
            .send()
            .await
            .map_err(transport)
    }

    async fn create_tag_ref(&self, tag: &str, tag_object_sha: &str) -> SourceResult<()> {
        let response = self
            .http
            .post(self.repo_url("git/refs"))
            .json(&CreateRefRequest {
                reference: format!("refs/tags/{tag}"),
                sha: tag_object_sha,
            })
            .send()
            .await
            .map_err(transport)?;
        Self::check_write(response, "create tag ref").await?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> SourceError {
    SourceError::Transport(err.to_string())
}

fn decode(err: reqwest::Error) -> SourceError {
    SourceError::Decode(err.to_string())
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn compare_commits(&self, base: &str, head: &str) -> SourceResult<Vec<CommitSummary>> {
        let range = format!("{base}...{head}");
        let mut commits = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .http
                .get(self.compare_url(base, head, page))
                .send()
                .await
                .map_err(transport)?;
            let body: CompareResponse = Self::check_read(response, "compare commits", &range)
                .await?
                .json()
                .await
                .map_err(decode)?;

            let fetched = body.commits.len();
            commits.extend(body.commits.into_iter().map(|c| CommitSummary {
                sha: c.sha,
                message: c.commit.message,
            }));
            debug!(
                range = %range,
                page = page,
                fetched = fetched,
                total = body.total_commits,
                "compare page"
            );

            if fetched < COMPARE_PAGE_SIZE || commits.len() >= body.total_commits {
                break;
            }
            page += 1;
        }

        Ok(commits)
    }

    async fn commit_sha(&self, reference: &str) -> SourceResult<String> {
        let response = self
            .http
            .get(self.repo_url(&format!("commits/{reference}")))
            .send()
            .await
            .map_err(transport)?;
        let body: ShaResponse = Self::check_read(response, "get commit", reference)
            .await?
            .json()
            .await
            .map_err(decode)?;
        Ok(body.sha)
    }

    async fn create_tag_object(
        &self,
        tag: &str,
        message: &str,
        commit_sha: &str,
    ) -> SourceResult<String> {
        let response = self
            .http
            .post(self.repo_url("git/tags"))
            .json(&CreateTagRequest {
                tag,
                message,
                object: commit_sha,
                object_type: "commit",
            })
            .send()
            .await
            .map_err(transport)?;
        let body: ShaResponse = Self::check_write(response, "create tag object")
            .await?
            .json()
            .await
            .map_err(decode)?;
        Ok(body.sha)
    }

    async fn point_tag_ref(&self, tag: &str, tag_object_sha: &str) -> SourceResult<RefUpdate> {
        let response = self.update_tag_ref(tag, tag_object_sha).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(RefUpdate::Moved);
        }
        // GitHub answers 422 "Reference does not exist" (sometimes 404) when
        // the tag has never been pushed.
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(tag = %tag, status = status.as_u16(), "tag ref missing, creating it");
            self.create_tag_ref(tag, tag_object_sha).await?;
            return Ok(RefUpdate::Created);
        }
        Err(SourceError::Status {
            operation: "update tag ref",
            status: status.as_u16(),
            body: read_error_body(response).await,
        })
    }
}

//! Remote collaborator traits.
//!
//! - `SourceHost`: commit comparison, ref lookup and tag writes on the
//!   source-hosting service
//! - `IssueTracker`: tenant lookup, token exchange and deployment submission
//! - `Connector`: builds both from validated credentials
//!
//! Each method is exactly one remote interaction (paging aside) and is never
//! retried. In-memory implementations live in the `fakes` module.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ClientCredentials, Secret};
use crate::error::{ConnectError, SourceResult, TrackerResult};
use crate::record::DeploymentRecord;

// ---------------------------------------------------------------------------
// SourceHost
// ---------------------------------------------------------------------------

/// A commit as returned by a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
}

/// How a tag ref was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdate {
    /// The ref did not exist and was created.
    Created,
    /// An existing ref was force-moved.
    Moved,
}

#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Commits reachable from `head` but not from `base`, oldest first.
    ///
    /// Returns `SourceError::RefNotFound` when either ref does not exist.
    async fn compare_commits(&self, base: &str, head: &str) -> SourceResult<Vec<CommitSummary>>;

    /// Resolve a branch, tag or sha to a commit sha.
    async fn commit_sha(&self, reference: &str) -> SourceResult<String>;

    /// Create an annotated tag object pointing at `commit_sha`.
    /// Returns the sha of the new tag object.
    async fn create_tag_object(
        &self,
        tag: &str,
        message: &str,
        commit_sha: &str,
    ) -> SourceResult<String>;

    /// Point `refs/tags/<tag>` at `tag_object_sha`, creating the ref if needed.
    async fn point_tag_ref(&self, tag: &str, tag_object_sha: &str) -> SourceResult<RefUpdate>;
}

// ---------------------------------------------------------------------------
// IssueTracker
// ---------------------------------------------------------------------------

/// Identity of a deployment as echoed back by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentKey {
    pub pipeline_id: String,
    pub environment_id: String,
    pub deployment_sequence_number: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectionError {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectedDeployment {
    pub key: Option<DeploymentKey>,
    pub errors: Vec<RejectionError>,
}

/// Body of a bulk-submit response. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionResponse {
    pub accepted_deployments: Vec<DeploymentKey>,
    pub rejected_deployments: Vec<RejectedDeployment>,
    pub unknown_issue_keys: Vec<String>,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Cloud id of the tracker instance at `instance_base_url`.
    async fn cloud_id(&self, instance_base_url: &str) -> TrackerResult<String>;

    /// Exchange client credentials for a bearer token.
    async fn access_token(&self, credentials: &ClientCredentials) -> TrackerResult<Secret>;

    /// Submit deployment records in one bulk request.
    async fn submit_deployments(
        &self,
        cloud_id: &str,
        token: &Secret,
        deployments: &[DeploymentRecord],
    ) -> TrackerResult<SubmissionResponse>;
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Builds the remote clients once credentials have been validated.
pub trait Connector {
    fn source_host(&self, token: &Secret) -> Result<Arc<dyn SourceHost>, ConnectError>;

    fn issue_tracker(&self) -> Result<Arc<dyn IssueTracker>, ConnectError>;
}

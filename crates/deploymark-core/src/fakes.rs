//! In-memory fakes for the remote ports (testing only)
//!
//! Provides `MemorySourceHost`, `MemoryIssueTracker` and `FakeConnector`.
//! Both fakes can share one `CallJournal` so tests can assert on the exact
//! order of remote interactions across services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{ClientCredentials, Secret};
use crate::error::{ConnectError, SourceError, SourceResult, TrackerError, TrackerResult};
use crate::ports::*;
use crate::record::DeploymentRecord;

// ---------------------------------------------------------------------------
// CallJournal
// ---------------------------------------------------------------------------

/// One remote interaction as seen by a fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CompareCommits { base: String, head: String },
    CommitSha { reference: String },
    CreateTagObject { tag: String, commit_sha: String },
    PointTagRef { tag: String, tag_object_sha: String },
    CloudId { instance_base_url: String },
    AccessToken,
    SubmitDeployments { cloud_id: String, count: usize },
}

impl RemoteCall {
    pub fn is_tracker_call(&self) -> bool {
        matches!(
            self,
            RemoteCall::CloudId { .. }
                | RemoteCall::AccessToken
                | RemoteCall::SubmitDeployments { .. }
        )
    }

    pub fn is_tag_write(&self) -> bool {
        matches!(
            self,
            RemoteCall::CreateTagObject { .. } | RemoteCall::PointTagRef { .. }
        )
    }
}

/// Shared, append-only record of remote calls.
#[derive(Debug, Clone, Default)]
pub struct CallJournal(Arc<Mutex<Vec<RemoteCall>>>);

impl CallJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: RemoteCall) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

// ---------------------------------------------------------------------------
// MemorySourceHost
// ---------------------------------------------------------------------------

/// Source-host operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOp {
    Compare,
    CommitSha,
    CreateTagObject,
    PointTagRef,
}

#[derive(Debug, Default)]
struct RepoState {
    /// Linear history per branch, oldest first.
    branches: HashMap<String, Vec<CommitSummary>>,
    /// Tag name -> commit sha.
    tags: HashMap<String, String>,
    /// Tag object sha -> commit sha.
    tag_objects: HashMap<String, String>,
    next_id: u64,
}

impl RepoState {
    fn next_sha(&mut self) -> String {
        self.next_id += 1;
        format!("{:040x}", self.next_id)
    }

    fn resolve(&self, reference: &str) -> Option<String> {
        if let Some(sha) = self.tags.get(reference) {
            return Some(sha.clone());
        }
        if let Some(history) = self.branches.get(reference) {
            return history.last().map(|c| c.sha.clone());
        }
        self.branches
            .values()
            .flatten()
            .find(|c| c.sha == reference)
            .map(|c| c.sha.clone())
    }
}

/// In-memory repository with linear branches and lightweight tag refs.
#[derive(Debug, Default)]
pub struct MemorySourceHost {
    journal: CallJournal,
    state: Mutex<RepoState>,
    failing: Mutex<Option<SourceOp>>,
}

impl MemorySourceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: CallJournal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    /// Append a commit to `branch` (creating it) and return its sha.
    pub fn push_commit(&self, branch: &str, message: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let sha = state.next_sha();
        state
            .branches
            .entry(branch.to_string())
            .or_default()
            .push(CommitSummary {
                sha: sha.clone(),
                message: message.to_string(),
            });
        sha
    }

    /// Point `tag` directly at `commit_sha`, as if tagged by hand.
    pub fn set_tag(&self, tag: &str, commit_sha: &str) {
        let mut state = self.state.lock().unwrap();
        state.tags.insert(tag.to_string(), commit_sha.to_string());
    }

    /// Commit the tag currently points at.
    pub fn tag_target(&self, tag: &str) -> Option<String> {
        self.state.lock().unwrap().tags.get(tag).cloned()
    }

    pub fn head(&self, branch: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .branches
            .get(branch)
            .and_then(|h| h.last())
            .map(|c| c.sha.clone())
    }

    /// Make every later call of `op` fail with HTTP 500.
    pub fn fail_on(&self, op: SourceOp) {
        *self.failing.lock().unwrap() = Some(op);
    }

    fn check_failure(&self, op: SourceOp, operation: &'static str) -> SourceResult<()> {
        if *self.failing.lock().unwrap() == Some(op) {
            return Err(SourceError::Status {
                operation,
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceHost for MemorySourceHost {
    async fn compare_commits(&self, base: &str, head: &str) -> SourceResult<Vec<CommitSummary>> {
        self.journal.record(RemoteCall::CompareCommits {
            base: base.to_string(),
            head: head.to_string(),
        });
        self.check_failure(SourceOp::Compare, "compare commits")?;

        let state = self.state.lock().unwrap();
        let base_sha = state.resolve(base).ok_or_else(|| SourceError::RefNotFound {
            reference: base.to_string(),
        })?;
        let history = state
            .branches
            .get(head)
            .ok_or_else(|| SourceError::RefNotFound {
                reference: head.to_string(),
            })?;

        let start = history
            .iter()
            .position(|c| c.sha == base_sha)
            .map(|i| i + 1)
            .unwrap_or(0);
        Ok(history[start..].to_vec())
    }

    async fn commit_sha(&self, reference: &str) -> SourceResult<String> {
        self.journal.record(RemoteCall::CommitSha {
            reference: reference.to_string(),
        });
        self.check_failure(SourceOp::CommitSha, "get commit")?;

        let state = self.state.lock().unwrap();
        state
            .resolve(reference)
            .ok_or_else(|| SourceError::RefNotFound {
                reference: reference.to_string(),
            })
    }

    async fn create_tag_object(
        &self,
        tag: &str,
        _message: &str,
        commit_sha: &str,
    ) -> SourceResult<String> {
        self.journal.record(RemoteCall::CreateTagObject {
            tag: tag.to_string(),
            commit_sha: commit_sha.to_string(),
        });
        self.check_failure(SourceOp::CreateTagObject, "create tag object")?;

        let mut state = self.state.lock().unwrap();
        let object_sha = state.next_sha();
        state
            .tag_objects
            .insert(object_sha.clone(), commit_sha.to_string());
        Ok(object_sha)
    }

    async fn point_tag_ref(&self, tag: &str, tag_object_sha: &str) -> SourceResult<RefUpdate> {
        self.journal.record(RemoteCall::PointTagRef {
            tag: tag.to_string(),
            tag_object_sha: tag_object_sha.to_string(),
        });
        self.check_failure(SourceOp::PointTagRef, "update tag ref")?;

        let mut state = self.state.lock().unwrap();
        let commit_sha = state
            .tag_objects
            .get(tag_object_sha)
            .cloned()
            .ok_or_else(|| SourceError::Status {
                operation: "update tag ref",
                status: 422,
                body: "Object does not exist".to_string(),
            })?;
        match state.tags.insert(tag.to_string(), commit_sha) {
            Some(_) => Ok(RefUpdate::Moved),
            None => Ok(RefUpdate::Created),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryIssueTracker
// ---------------------------------------------------------------------------

/// Tracker operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerOp {
    CloudId,
    AccessToken,
    Submit,
}

pub const FAKE_CLOUD_ID: &str = "00000000-fake-cloud";

/// In-memory tracker that accepts everything unless told otherwise.
#[derive(Debug, Default)]
pub struct MemoryIssueTracker {
    journal: CallJournal,
    rejections: Mutex<Vec<RejectedDeployment>>,
    unknown_issue_keys: Mutex<Vec<String>>,
    failing: Mutex<Option<TrackerOp>>,
    submitted: Mutex<Vec<DeploymentRecord>>,
}

impl MemoryIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: CallJournal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    /// Reject the next submissions with these error messages.
    pub fn reject_with(&self, messages: &[&str]) {
        self.rejections.lock().unwrap().push(RejectedDeployment {
            key: None,
            errors: messages
                .iter()
                .map(|m| RejectionError {
                    message: m.to_string(),
                })
                .collect(),
        });
    }

    pub fn set_unknown_issue_keys(&self, keys: &[&str]) {
        *self.unknown_issue_keys.lock().unwrap() = keys.iter().map(|k| k.to_string()).collect();
    }

    /// Make every later call of `op` fail at the transport level.
    pub fn fail_on(&self, op: TrackerOp) {
        *self.failing.lock().unwrap() = Some(op);
    }

    /// Every record received, accepted or not.
    pub fn submitted(&self) -> Vec<DeploymentRecord> {
        self.submitted.lock().unwrap().clone()
    }

    fn check_failure(&self, op: TrackerOp) -> TrackerResult<()> {
        if *self.failing.lock().unwrap() == Some(op) {
            return Err(TrackerError::Transport("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for MemoryIssueTracker {
    async fn cloud_id(&self, instance_base_url: &str) -> TrackerResult<String> {
        self.journal.record(RemoteCall::CloudId {
            instance_base_url: instance_base_url.to_string(),
        });
        self.check_failure(TrackerOp::CloudId)?;
        Ok(FAKE_CLOUD_ID.to_string())
    }

    async fn access_token(&self, _credentials: &ClientCredentials) -> TrackerResult<Secret> {
        self.journal.record(RemoteCall::AccessToken);
        self.check_failure(TrackerOp::AccessToken)?;
        Ok(Secret::new("fake-access-token"))
    }

    async fn submit_deployments(
        &self,
        cloud_id: &str,
        _token: &Secret,
        deployments: &[DeploymentRecord],
    ) -> TrackerResult<SubmissionResponse> {
        self.journal.record(RemoteCall::SubmitDeployments {
            cloud_id: cloud_id.to_string(),
            count: deployments.len(),
        });
        self.check_failure(TrackerOp::Submit)?;

        self.submitted
            .lock()
            .unwrap()
            .extend(deployments.iter().cloned());

        let rejected_deployments = self.rejections.lock().unwrap().clone();
        let accepted_deployments = if rejected_deployments.is_empty() {
            deployments
                .iter()
                .map(|d| DeploymentKey {
                    pipeline_id: d.pipeline.id.clone(),
                    environment_id: d.environment.id.clone(),
                    deployment_sequence_number: d.deployment_sequence_number,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(SubmissionResponse {
            accepted_deployments,
            rejected_deployments,
            unknown_issue_keys: self.unknown_issue_keys.lock().unwrap().clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeConnector
// ---------------------------------------------------------------------------

/// Hands out shared fakes and counts how many clients were requested.
#[derive(Debug)]
pub struct FakeConnector {
    source: Arc<MemorySourceHost>,
    tracker: Arc<MemoryIssueTracker>,
    connections: AtomicUsize,
}

impl FakeConnector {
    pub fn new(source: Arc<MemorySourceHost>, tracker: Arc<MemoryIssueTracker>) -> Self {
        Self {
            source,
            tracker,
            connections: AtomicUsize::new(0),
        }
    }

    /// Number of clients built so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn source_host(&self, _token: &Secret) -> Result<Arc<dyn SourceHost>, ConnectError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let source: Arc<dyn SourceHost> = self.source.clone();
        Ok(source)
    }

    fn issue_tracker(&self) -> Result<Arc<dyn IssueTracker>, ConnectError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let tracker: Arc<dyn IssueTracker> = self.tracker.clone();
        Ok(tracker)
    }
}

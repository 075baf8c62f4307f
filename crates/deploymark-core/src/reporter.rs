//! Deployment reporting to the issue tracker.
//!
//! Three dependent calls, in order: tenant lookup, token exchange, bulk
//! submit. The first failure stops the sequence.

use tracing::{debug, warn};

use crate::config::ClientCredentials;
use crate::error::{TrackerError, TrackerResult};
use crate::ports::{IssueTracker, SubmissionResponse};
use crate::record::DeploymentRecord;

/// What the tracker told us about an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub cloud_id: String,
    pub accepted: usize,
    pub unknown_issue_keys: Vec<String>,
}

pub struct DeploymentReporter<'a> {
    tracker: &'a dyn IssueTracker,
    instance_base_url: &'a str,
    credentials: &'a ClientCredentials,
}

impl<'a> DeploymentReporter<'a> {
    pub fn new(
        tracker: &'a dyn IssueTracker,
        instance_base_url: &'a str,
        credentials: &'a ClientCredentials,
    ) -> Self {
        Self {
            tracker,
            instance_base_url,
            credentials,
        }
    }

    /// Submit `record` as the single entry of a bulk request.
    pub async fn report(&self, record: &DeploymentRecord) -> TrackerResult<SubmissionSummary> {
        let cloud_id = self.tracker.cloud_id(self.instance_base_url).await?;
        debug!(cloud_id = %cloud_id, "resolved tracker tenant");

        let token = self.tracker.access_token(self.credentials).await?;

        let response = self
            .tracker
            .submit_deployments(&cloud_id, &token, std::slice::from_ref(record))
            .await?;
        check_rejections(&response)?;

        if !response.unknown_issue_keys.is_empty() {
            warn!(
                unknown_issue_keys = ?response.unknown_issue_keys,
                "tracker does not know some of the reported issue keys"
            );
        }

        Ok(SubmissionSummary {
            cloud_id,
            accepted: response.accepted_deployments.len(),
            unknown_issue_keys: response.unknown_issue_keys,
        })
    }
}

/// Fail if the tracker rejected any deployment, using the messages of the
/// first rejection joined by `", "`.
pub fn check_rejections(response: &SubmissionResponse) -> TrackerResult<()> {
    match response.rejected_deployments.first() {
        None => Ok(()),
        Some(rejected) => {
            let message = rejected
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            if message.is_empty() {
                Err(TrackerError::Rejected(
                    "deployment rejected without error details".to_string(),
                ))
            } else {
                Err(TrackerError::Rejected(message))
            }
        }
    }
}

//! Deployment run state machine.
//!
//! ```text
//! ValidatingEnv -> ResolvingChangeSet -> ExtractingIssues -+-> Reporting -> Tagging -> Done
//!                                                          +-> Done (no issues)
//! ```
//!
//! Any phase except `ExtractingIssues` can end the run with a [`RunError`].
//! The marker tag is only touched after the report succeeded, so a failed
//! report leaves the tag where it was.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::change_set::ChangeSetResolver;
use crate::config::{Credentials, EnvLookup, Settings};
use crate::error::{RunError, SourceError};
use crate::extract::{extract_issue_keys, IssueKeys};
use crate::obs;
use crate::ports::{Connector, IssueTracker, SourceHost};
use crate::record::DeploymentRecord;
use crate::reporter::{DeploymentReporter, SubmissionSummary};
use crate::tagger::{MarkerTag, MarkerTagger, TagPlacement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ValidatingEnv,
    ResolvingChangeSet,
    ExtractingIssues,
    Reporting,
    Tagging,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ValidatingEnv => "validating-env",
            Phase::ResolvingChangeSet => "resolving-change-set",
            Phase::ExtractingIssues => "extracting-issues",
            Phase::Reporting => "reporting",
            Phase::Tagging => "tagging",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Successful end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No issue keys since the marker; nothing was reported or tagged.
    NoIssues { base: String, head: String },
    /// The deployment was reported and the marker tag moved.
    Reported(DeploymentReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub issue_keys: IssueKeys,
    pub submission: SubmissionSummary,
    pub placement: TagPlacement,
}

/// Run the whole flow: validate secrets, connect, then [`DeploymentRun::execute`].
///
/// No client is built, and so no remote call is made, unless every required
/// secret is present.
pub async fn run_deployment(
    settings: &Settings,
    env: &dyn EnvLookup,
    connector: &dyn Connector,
) -> Result<RunOutcome, RunError> {
    let span = obs::run_span(settings.context().run_id, settings.environment_name());

    let result = connect_and_execute(settings, env, connector)
        .instrument(span)
        .await;
    if let Err(err) = &result {
        obs::emit_run_failed(err);
    }
    result
}

async fn connect_and_execute(
    settings: &Settings,
    env: &dyn EnvLookup,
    connector: &dyn Connector,
) -> Result<RunOutcome, RunError> {
    obs::emit_phase_entered(Phase::ValidatingEnv);
    let credentials = Credentials::from_env(env).map_err(RunError::Environment)?;

    let source = connector
        .source_host(&credentials.github_token)
        .map_err(RunError::Connect)?;
    let tracker = connector.issue_tracker().map_err(RunError::Connect)?;

    DeploymentRun::new(settings, &credentials, source.as_ref(), tracker.as_ref())
        .execute(Utc::now())
        .await
}

/// A run with validated credentials and connected clients.
pub struct DeploymentRun<'a> {
    settings: &'a Settings,
    credentials: &'a Credentials,
    source: &'a dyn SourceHost,
    tracker: &'a dyn IssueTracker,
    marker: MarkerTag,
}

impl<'a> DeploymentRun<'a> {
    pub fn new(
        settings: &'a Settings,
        credentials: &'a Credentials,
        source: &'a dyn SourceHost,
        tracker: &'a dyn IssueTracker,
    ) -> Self {
        Self {
            settings,
            credentials,
            source,
            tracker,
            marker: MarkerTag::for_environment(settings.environment_name()),
        }
    }

    /// Execute the phases after validation. `now` stamps the deployment record.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<RunOutcome, RunError> {
        let base = self.marker.name();
        let head = self.settings.branch_name();

        obs::emit_phase_entered(Phase::ResolvingChangeSet);
        let change_set = ChangeSetResolver::new(self.source)
            .resolve(base, head)
            .await
            .map_err(|err| match err {
                SourceError::RefNotFound { .. } => RunError::MarkerTagMissing {
                    tag: base.to_string(),
                    branch: head.to_string(),
                },
                other => RunError::ChangeSet(other),
            })?;
        obs::emit_change_set_resolved(base, head, change_set.len());

        obs::emit_phase_entered(Phase::ExtractingIssues);
        let issue_keys = extract_issue_keys(change_set.messages());
        if issue_keys.is_empty() {
            obs::emit_no_issues(base, head);
            obs::emit_phase_entered(Phase::Done);
            return Ok(RunOutcome::NoIssues {
                base: base.to_string(),
                head: head.to_string(),
            });
        }

        obs::emit_phase_entered(Phase::Reporting);
        let record = DeploymentRecord::build(self.settings, issue_keys.clone(), now);
        let submission = DeploymentReporter::new(
            self.tracker,
            self.settings.cloud_instance_base_url(),
            &self.credentials.jira,
        )
        .report(&record)
        .await
        .map_err(RunError::Report)?;
        obs::emit_reported(&submission.cloud_id, issue_keys.len(), submission.accepted);

        obs::emit_phase_entered(Phase::Tagging);
        let placement = MarkerTagger::new(self.source)
            .move_to_head(&self.marker, head)
            .await
            .map_err(RunError::Tagging)?;
        obs::emit_tagged(&placement.tag, &placement.commit_sha);

        obs::emit_phase_entered(Phase::Done);
        Ok(RunOutcome::Reported(DeploymentReport {
            issue_keys,
            submission,
            placement,
        }))
    }
}

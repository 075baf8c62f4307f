//! deploymark core
//!
//! Reports a deployment to Jira from CI and checkpoints it with a marker tag.
//!
//! ## Flow
//!
//! 1. Compare the environment's marker tag with the branch head
//! 2. Extract issue keys from the commit messages in between
//! 3. Report one deployment record to the tracker
//! 4. Move the marker tag to the branch head
//!
//! The remote services sit behind the [`SourceHost`] and [`IssueTracker`]
//! traits; HTTP implementations live in `deploymark-http`, in-memory ones in
//! [`fakes`].

pub mod change_set;
pub mod config;
pub mod error;
pub mod extract;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod ports;
pub mod record;
pub mod reporter;
pub mod tagger;
pub mod telemetry;

pub use change_set::{ChangeSet, ChangeSetResolver};
pub use config::{
    ClientCredentials, Credentials, EnvLookup, ProcessEnv, Repository, RunContext, Secret,
    Settings, DEFAULT_BRANCH, REQUIRED_ENV_VARS,
};
pub use error::{
    ConfigError, ConnectError, RunError, SourceError, SourceResult, TrackerError, TrackerResult,
};
pub use extract::{extract_issue_keys, IssueKey, IssueKeys};
pub use orchestrator::{run_deployment, DeploymentReport, DeploymentRun, Phase, RunOutcome};
pub use ports::{
    CommitSummary, Connector, DeploymentKey, IssueTracker, RefUpdate, RejectedDeployment,
    RejectionError, SourceHost, SubmissionResponse,
};
pub use record::{format_timestamp, DeploymentRecord, DeploymentState, Environment, Pipeline};
pub use reporter::{check_rejections, DeploymentReporter, SubmissionSummary};
pub use tagger::{MarkerTag, MarkerTagger, TagPlacement};
pub use telemetry::init_tracing;

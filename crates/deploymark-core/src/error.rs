//! Error taxonomy for deploymark.
//!
//! Each remote collaborator has its own error type ([`SourceError`] for the
//! source host, [`TrackerError`] for the issue tracker). The orchestrator wraps
//! them in [`RunError`], one variant per phase, so every terminal failure
//! carries an operator-facing message prefixed by the phase it occurred in.

use crate::orchestrator::Phase;

/// Errors produced while loading configuration or credentials.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "Please make sure that all required env-variables are provided: {} (missing: {})",
        crate::config::REQUIRED_ENV_VARS.join(", "),
        .missing.join(", ")
    )]
    MissingEnv { missing: Vec<&'static str> },

    #[error("input '{0}' is required")]
    MissingInput(&'static str),

    #[error("invalid repository slug '{0}', expected 'owner/name'")]
    InvalidRepository(String),
}

/// A client for one of the remote services could not be constructed.
#[derive(Debug, thiserror::Error)]
#[error("failed to initialise {service} client: {reason}")]
pub struct ConnectError {
    pub service: &'static str,
    pub reason: String,
}

impl ConnectError {
    pub fn new(service: &'static str, reason: impl Into<String>) -> Self {
        Self {
            service,
            reason: reason.into(),
        }
    }
}

/// Errors returned by the source-hosting service.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The API answered 404 for a reference (tag, branch or commit).
    #[error("reference not found: {reference}")]
    RefNotFound { reference: String },

    /// Non-success HTTP status other than a missing reference.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors returned by the issue tracker.
///
/// `Rejected` is a logical failure: the HTTP exchange succeeded but the
/// tracker refused the deployment. The other variants are transport-level.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("deployment rejected by Jira: {0}")]
    Rejected(String),
}

impl TrackerError {
    /// Whether the tracker accepted the request but refused the deployment.
    pub fn is_rejection(&self) -> bool {
        matches!(self, TrackerError::Rejected(_))
    }
}

/// Terminal failure of a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0}")]
    Environment(#[source] ConfigError),

    #[error("{0}")]
    Connect(#[source] ConnectError),

    #[error(
        "An error occurred while retrieving commit messages: marker tag '{tag}' or branch \
         '{branch}' does not exist. If this is the first deployment to this environment, \
         create the tag at the last deployed commit and re-run"
    )]
    MarkerTagMissing { tag: String, branch: String },

    #[error("An error occurred while retrieving commit messages: {0}")]
    ChangeSet(#[source] SourceError),

    #[error("An error occurred while sending deployment info to Jira: {0}")]
    Report(#[source] TrackerError),

    #[error(
        "An error occurred while tagging latest commit (the deployment was already reported, \
         the marker tag was not moved): {0}"
    )]
    Tagging(#[source] SourceError),
}

impl RunError {
    /// The phase in which the run failed.
    pub fn phase(&self) -> Phase {
        match self {
            RunError::Environment(_) | RunError::Connect(_) => Phase::ValidatingEnv,
            RunError::MarkerTagMissing { .. } | RunError::ChangeSet(_) => {
                Phase::ResolvingChangeSet
            }
            RunError::Report(_) => Phase::Reporting,
            RunError::Tagging(_) => Phase::Tagging,
        }
    }
}

/// Result type for source-host operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type for issue-tracker operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

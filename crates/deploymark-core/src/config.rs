//! Run configuration and credentials.
//!
//! [`Settings`] is built once at startup from the CI inputs and run context
//! and passed by reference into every component. [`Credentials`] are read
//! separately, through an [`EnvLookup`], as the first phase of a run.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Branch compared against the marker tag when none is configured.
pub const DEFAULT_BRANCH: &str = "master";

pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const JIRA_CLIENT_ID_VAR: &str = "JIRA_CLIENT_ID";
pub const JIRA_CLIENT_SECRET_VAR: &str = "JIRA_CLIENT_SECRET";

/// Secrets that must be present before any remote call is made.
pub const REQUIRED_ENV_VARS: [&str; 3] =
    [JIRA_CLIENT_ID_VAR, JIRA_CLIENT_SECRET_VAR, GITHUB_TOKEN_VAR];

/// Repository addressed on the source host, parsed from `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repository {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Repository::new(owner, name))
            }
            _ => Err(ConfigError::InvalidRepository(s.to_string())),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Facts about the CI run that triggered this deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub repository: Repository,
    /// Web root of the source host, e.g. `https://github.com`.
    pub server_url: String,
    pub run_id: u64,
    pub run_number: u64,
    pub workflow: String,
}

impl RunContext {
    /// Browser URL of the workflow run.
    pub fn run_url(&self) -> String {
        format!(
            "{}/{}/actions/runs/{}",
            self.server_url.trim_end_matches('/'),
            self.repository.full_name(),
            self.run_id
        )
    }
}

/// Immutable configuration for a single deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    cloud_instance_base_url: String,
    environment_type: String,
    environment_name: String,
    branch_name: String,
    context: RunContext,
}

impl Settings {
    /// Build settings from the raw CI inputs.
    ///
    /// `branch_name` and `environment_type` are optional; an absent or empty
    /// branch falls back to [`DEFAULT_BRANCH`].
    pub fn new(
        cloud_instance_base_url: &str,
        environment_name: &str,
        environment_type: Option<&str>,
        branch_name: Option<&str>,
        context: RunContext,
    ) -> Result<Self, ConfigError> {
        let cloud_instance_base_url = cloud_instance_base_url.trim().trim_end_matches('/');
        if cloud_instance_base_url.is_empty() {
            return Err(ConfigError::MissingInput("cloud-instance-base-url"));
        }
        let environment_name = environment_name.trim();
        if environment_name.is_empty() {
            return Err(ConfigError::MissingInput("environment-name"));
        }

        let branch_name = branch_name
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH);

        Ok(Self {
            cloud_instance_base_url: cloud_instance_base_url.to_string(),
            environment_type: environment_type.unwrap_or_default().trim().to_string(),
            environment_name: environment_name.to_string(),
            branch_name: branch_name.to_string(),
            context,
        })
    }

    pub fn cloud_instance_base_url(&self) -> &str {
        &self.cloud_instance_base_url
    }

    pub fn environment_type(&self) -> &str {
        &self.environment_type
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }
}

/// A confidential value. `Debug` and `Display` never print the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Borrow the raw value, e.g. to put it in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// OAuth client-credentials pair for the issue tracker.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: Secret,
    pub client_secret: Secret,
}

/// All secrets a run needs.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub github_token: Secret,
    pub jira: ClientCredentials,
}

impl Credentials {
    /// Read the required secrets, failing with every missing name at once.
    ///
    /// Empty values count as missing.
    pub fn from_env(env: &dyn EnvLookup) -> Result<Self, ConfigError> {
        let read = |key: &str| env.var(key).filter(|v| !v.is_empty());

        let missing: Vec<&'static str> = REQUIRED_ENV_VARS
            .iter()
            .copied()
            .filter(|key| read(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv { missing });
        }

        let secret = |key: &str| Secret::new(read(key).unwrap_or_default());
        Ok(Credentials {
            github_token: secret(GITHUB_TOKEN_VAR),
            jira: ClientCredentials {
                client_id: secret(JIRA_CLIENT_ID_VAR),
                client_secret: secret(JIRA_CLIENT_SECRET_VAR),
            },
        })
    }
}

/// Source of environment variables.
pub trait EnvLookup {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

//! Command-line arguments.
//!
//! Every flag falls back to the variable GitHub Actions sets for it: action
//! inputs arrive as `INPUT_<NAME>` (name upper-cased, hyphens kept) and the
//! run context as `GITHUB_*`.

use anyhow::Result;
use clap::Parser;
use deploymark_core::{Repository, RunContext, Settings};
use deploymark_http::{HttpConnector, DEFAULT_ATLASSIAN_API_URL, DEFAULT_GITHUB_API_URL};

#[derive(Debug, Parser)]
#[command(name = "deploymark")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Report a deployment to Jira and move the environment's marker tag",
    long_about = None
)]
pub struct Cli {
    /// Base URL of the Jira cloud instance, e.g. https://acme.atlassian.net
    #[arg(long, env = "INPUT_CLOUD-INSTANCE-BASE-URL")]
    pub cloud_instance_base_url: Option<String>,

    /// Environment classification (production, staging, testing, ...)
    #[arg(long, env = "INPUT_ENVIRONMENT-TYPE")]
    pub environment_type: Option<String>,

    /// Environment display name; lower-cased it also names the marker tag
    #[arg(long, env = "INPUT_ENVIRONMENT-NAME")]
    pub environment_name: Option<String>,

    /// Branch compared against the marker tag [default: master]
    #[arg(long, env = "INPUT_BRANCH-NAME")]
    pub branch_name: Option<String>,

    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: String,

    /// Workflow run id; also the deployment sequence number
    #[arg(long, env = "GITHUB_RUN_ID")]
    pub run_id: u64,

    #[arg(long, env = "GITHUB_RUN_NUMBER")]
    pub run_number: u64,

    /// Workflow name
    #[arg(long, env = "GITHUB_WORKFLOW")]
    pub workflow: String,

    #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com")]
    pub server_url: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    #[arg(long, env = "ATLASSIAN_API_URL", default_value = DEFAULT_ATLASSIAN_API_URL)]
    pub atlassian_api_url: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn repository(&self) -> Result<Repository> {
        Ok(self.repository.parse()?)
    }

    pub fn settings(&self) -> Result<Settings> {
        let context = RunContext {
            repository: self.repository()?,
            server_url: self.server_url.clone(),
            run_id: self.run_id,
            run_number: self.run_number,
            workflow: self.workflow.clone(),
        };
        Ok(Settings::new(
            self.cloud_instance_base_url.as_deref().unwrap_or_default(),
            self.environment_name.as_deref().unwrap_or_default(),
            self.environment_type.as_deref(),
            self.branch_name.as_deref(),
            context,
        )?)
    }

    pub fn connector(&self) -> Result<HttpConnector> {
        Ok(HttpConnector::new(self.repository()?)
            .with_github_api_url(&self.github_api_url)
            .with_atlassian_api_url(&self.atlassian_api_url))
    }
}

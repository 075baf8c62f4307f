//! Deployment record sent to the Jira deployments API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::extract::IssueKeys;

pub const SCHEMA_VERSION: &str = "1.0";

/// Lifecycle state of a reported deployment. This flow only reports
/// completed deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Successful,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub display_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub environment_type: String,
}

/// One deployment event, built once per run and sent once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub schema_version: String,
    pub deployment_sequence_number: u64,
    pub update_sequence_number: u64,
    pub issue_keys: IssueKeys,
    pub display_name: String,
    pub url: String,
    pub description: String,
    pub last_updated: String,
    pub label: String,
    pub state: DeploymentState,
    pub pipeline: Pipeline,
    pub environment: Environment,
}

impl DeploymentRecord {
    /// Describe a successful deployment of `issue_keys` at `now`.
    ///
    /// The CI run id doubles as the deployment and update sequence number, so
    /// re-running the same workflow run updates the same deployment.
    pub fn build(settings: &Settings, issue_keys: IssueKeys, now: DateTime<Utc>) -> Self {
        let ctx = settings.context();
        let run_url = ctx.run_url();
        let environment_name = settings.environment_name();

        DeploymentRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            deployment_sequence_number: ctx.run_id,
            update_sequence_number: ctx.run_id,
            issue_keys,
            display_name: environment_name.to_string(),
            url: run_url.clone(),
            description: String::new(),
            last_updated: format_timestamp(now),
            label: String::new(),
            state: DeploymentState::Successful,
            pipeline: Pipeline {
                id: format!("{} {}", ctx.repository.full_name(), ctx.workflow),
                display_name: format!("Workflow: {} (#{})", ctx.workflow, ctx.run_number),
                url: run_url,
            },
            environment: Environment {
                id: environment_name.to_lowercase(),
                display_name: environment_name.to_string(),
                environment_type: settings.environment_type().to_string(),
            },
        }
    }
}

/// ISO-8601 UTC timestamp with second precision, e.g. `2024-03-01T09:30:00Z`.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

//! deploymark - report a deployment to Jira from a GitHub Actions run
//!
//! Compares the environment's marker tag with the branch head, reports the
//! Jira issue keys found in the commits between them as one deployment, then
//! moves the marker tag to the head.
//!
//! Inputs come from flags or the `INPUT_*` / `GITHUB_*` variables the runner
//! sets; secrets (`GITHUB_TOKEN`, `JIRA_CLIENT_ID`, `JIRA_CLIENT_SECRET`) only
//! from the environment.

mod actions;
mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use deploymark_core::{run_deployment, ProcessEnv, RunOutcome};
use tracing::{info, Level};

use crate::cli::Cli;

const NO_ISSUES_WARNING: &str = "There are no issue keys found. Aborting...";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    deploymark_core::init_tracing(cli.json, level);

    let step = report(&run(&cli).await);
    for line in &step.stdout {
        println!("{line}");
    }
    ExitCode::from(step.exit_code)
}

async fn run(cli: &Cli) -> Result<RunOutcome> {
    let settings = cli.settings()?;
    let connector = cli.connector()?;

    let outcome = run_deployment(&settings, &ProcessEnv, &connector).await?;
    if let RunOutcome::Reported(report) = &outcome {
        info!(
            event = "run.completed",
            tag = %report.placement.tag,
            commit = %report.placement.commit_sha,
            issues = report.issue_keys.len(),
            "deployment reported"
        );
    }
    Ok(outcome)
}

/// What the step writes to stdout and how it exits.
#[derive(Debug, PartialEq, Eq)]
struct StepReport {
    stdout: Vec<String>,
    exit_code: u8,
}

fn report(result: &Result<RunOutcome>) -> StepReport {
    match result {
        Ok(RunOutcome::NoIssues { .. }) => StepReport {
            stdout: vec![actions::format_command("warning", NO_ISSUES_WARNING)],
            exit_code: 0,
        },
        Ok(RunOutcome::Reported(report)) => StepReport {
            stdout: report.issue_keys.iter().map(|k| k.to_string()).collect(),
            exit_code: 0,
        },
        // RunError messages already embed their cause
        Err(err) => StepReport {
            stdout: vec![actions::format_command("error", &err.to_string())],
            exit_code: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploymark_core::{
        extract_issue_keys, DeploymentReport, RefUpdate, RunError, SubmissionSummary,
        TagPlacement, TrackerError,
    };

    #[test]
    fn test_no_issues_warns_and_succeeds() {
        let step = report(&Ok(RunOutcome::NoIssues {
            base: "production-deployment".to_string(),
            head: "master".to_string(),
        }));
        assert_eq!(
            step,
            StepReport {
                stdout: vec!["::warning::There are no issue keys found. Aborting...".to_string()],
                exit_code: 0,
            }
        );
    }

    #[test]
    fn test_reported_prints_one_key_per_line() {
        let outcome = RunOutcome::Reported(DeploymentReport {
            issue_keys: extract_issue_keys(["DEF-7 fix", "ABC-12 feat"]),
            submission: SubmissionSummary {
                cloud_id: "cloud-1".to_string(),
                accepted: 1,
                unknown_issue_keys: Vec::new(),
            },
            placement: TagPlacement {
                tag: "production-deployment".to_string(),
                commit_sha: "c0ffee".to_string(),
                tag_object_sha: "7a9".to_string(),
                ref_update: RefUpdate::Moved,
            },
        });

        let step = report(&Ok(outcome));
        assert_eq!(step.stdout, vec!["ABC-12", "DEF-7"]);
        assert_eq!(step.exit_code, 0);
    }

    #[test]
    fn test_failure_emits_error_command_and_exit_1() {
        let err = RunError::Report(TrackerError::Rejected("bad env\nsecond".to_string()));
        let step = report(&Err(err.into()));

        assert_eq!(step.exit_code, 1);
        assert_eq!(step.stdout.len(), 1);
        assert!(step.stdout[0].starts_with(
            "::error::An error occurred while sending deployment info to Jira"
        ));
        assert!(step.stdout[0].ends_with("bad env%0Asecond"));
    }
}

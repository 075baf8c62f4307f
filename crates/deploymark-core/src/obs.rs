//! Structured lifecycle events for a deployment run.
//!
//! - Run-scoped span via [`run_span`], attached with `Instrument`
//! - One emission function per lifecycle event: phase entered, no issues,
//!   reported, tagged, failed
//!
//! All events carry an `event` field so they can be filtered in JSON output.

use tracing::{error, info, warn};

use crate::error::RunError;
use crate::orchestrator::Phase;

/// Span tagged with the CI run id and environment. Attach it to the run
/// future rather than entering it, so it stays correct across awaits.
pub fn run_span(run_id: u64, environment: &str) -> tracing::Span {
    tracing::info_span!("deploymark.run", run_id = run_id, environment = %environment)
}

pub fn emit_phase_entered(phase: Phase) {
    info!(event = "run.phase", phase = %phase);
}

pub fn emit_change_set_resolved(base: &str, head: &str, commits: usize) {
    info!(event = "change_set.resolved", base = %base, head = %head, commits = commits);
}

/// Warning: nothing to report, run ends without side effects.
pub fn emit_no_issues(base: &str, head: &str) {
    warn!(
        event = "run.no_issues",
        base = %base,
        head = %head,
        "There are no issue keys found. Aborting..."
    );
}

pub fn emit_reported(cloud_id: &str, issue_count: usize, accepted: usize) {
    info!(
        event = "deployment.reported",
        cloud_id = %cloud_id,
        issue_count = issue_count,
        accepted = accepted,
    );
}

pub fn emit_tagged(tag: &str, commit_sha: &str) {
    info!(event = "marker.moved", tag = %tag, commit_sha = %commit_sha);
}

/// Terminal failure. Rejections and transport failures are told apart by the
/// `rejected` field.
pub fn emit_run_failed(err: &RunError) {
    let rejected = matches!(err, RunError::Report(e) if e.is_rejection());
    error!(
        event = "run.failed",
        phase = %err.phase(),
        rejected = rejected,
        error = %err,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_events_inside_run_span_carry_run_id() {
        let _guard = run_span(1234, "production").entered();
        emit_tagged("production-deployment", "abc123");
        assert!(logs_contain("run_id=1234"));
        assert!(logs_contain("marker.moved"));
    }

    #[traced_test]
    #[test]
    fn test_emit_no_issues_logs_warning() {
        emit_no_issues("production-deployment", "master");
        assert!(logs_contain("There are no issue keys found"));
        assert!(logs_contain("run.no_issues"));
    }

    #[traced_test]
    #[test]
    fn test_emit_run_failed_marks_rejection() {
        emit_run_failed(&RunError::Report(TrackerError::Rejected(
            "unknown environment".to_string(),
        )));
        assert!(logs_contain("rejected=true"));
        assert!(logs_contain("phase=reporting"));
    }

    #[traced_test]
    #[test]
    fn test_emit_phase_entered() {
        emit_phase_entered(Phase::ResolvingChangeSet);
        assert!(logs_contain("phase=resolving-change-set"));
    }
}

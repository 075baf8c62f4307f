//! Change set between the marker tag and the branch head.

use tracing::debug;

use crate::error::SourceResult;
use crate::ports::{CommitSummary, SourceHost};

/// Commits reachable from `head` but not from `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub base: String,
    pub head: String,
    pub commits: Vec<CommitSummary>,
}

impl ChangeSet {
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.commits.iter().map(|c| c.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }
}

/// Resolves the commits deployed since the last marker.
pub struct ChangeSetResolver<'a> {
    source: &'a dyn SourceHost,
}

impl<'a> ChangeSetResolver<'a> {
    pub fn new(source: &'a dyn SourceHost) -> Self {
        Self { source }
    }

    /// Single comparison of `base...head`. A missing base is an error, not
    /// an empty history.
    pub async fn resolve(&self, base: &str, head: &str) -> SourceResult<ChangeSet> {
        let commits = self.source.compare_commits(base, head).await?;
        debug!(base = %base, head = %head, commits = commits.len(), "resolved change set");
        Ok(ChangeSet {
            base: base.to_string(),
            head: head.to_string(),
            commits,
        })
    }
}

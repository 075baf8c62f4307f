//! Issue-key extraction from commit messages.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Project code followed by a number, e.g. `ABC-123`.
const ISSUE_KEY_PATTERN: &str = r"([A-Z]+-[0-9]+)";

fn issue_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ISSUE_KEY_PATTERN).expect("issue key pattern is valid"))
}

/// An issue identifier such as `ABC-12`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distinct issue keys collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKeys(BTreeSet<IssueKey>);

impl IssueKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: IssueKey) -> bool {
        self.0.insert(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k.as_str() == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IssueKey> {
        self.0.iter()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|k| k.0.clone()).collect()
    }
}

impl FromIterator<IssueKey> for IssueKeys {
    fn from_iter<T: IntoIterator<Item = IssueKey>>(iter: T) -> Self {
        IssueKeys(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a IssueKeys {
    type Item = &'a IssueKey;
    type IntoIter = std::collections::btree_set::Iter<'a, IssueKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Collect every issue key mentioned in `messages`.
///
/// Each message is scanned independently and contributes all of its keys, not
/// only the first: `"ABC-12 and DEF-7"` yields both. Messages without a key
/// contribute nothing; an empty result means there is nothing to report.
pub fn extract_issue_keys<I, S>(messages: I) -> IssueKeys
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let re = issue_key_regex();
    let mut keys = IssueKeys::new();
    for message in messages {
        for caps in re.captures_iter(message.as_ref()) {
            keys.insert(IssueKey(caps[1].to_string()));
        }
    }
    keys
}

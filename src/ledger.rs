//! Round bookkeeping over a topic directory.
//!
//! Round artifacts are named `<kind>[-p<scope>]-r<N>-(input|response).md`.
//! Everything here is derived from a fresh directory listing on each call.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKind {
    Discussion,
    Interview,
}

impl RoundKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundKind::Discussion => "discussion",
            RoundKind::Interview => "interview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Input,
    Response,
}

impl Artifact {
    fn as_str(self) -> &'static str {
        match self {
            Artifact::Input => "input",
            Artifact::Response => "response",
        }
    }
}

/// One past round. Absent files read as empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundEntry {
    pub number: u32,
    pub input: String,
    pub response: String,
}

#[derive(Debug, Clone)]
pub struct RoundLedger {
    dir: PathBuf,
    pattern: Regex,
}

impl RoundLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pattern: Regex::new(r"^(discussion|interview)(?:-p(\d+))?-r(\d+)-(?:input|response)\.md$")
                .expect("round file pattern is valid"),
        }
    }

    pub fn file_name(kind: RoundKind, scope: Option<u32>, round: u32, artifact: Artifact) -> String {
        match scope {
            Some(p) => format!("{}-p{}-r{}-{}.md", kind.as_str(), p, round, artifact.as_str()),
            None => format!("{}-r{}-{}.md", kind.as_str(), round, artifact.as_str()),
        }
    }

    pub fn path(&self, kind: RoundKind, scope: Option<u32>, round: u32, artifact: Artifact) -> PathBuf {
        self.dir.join(Self::file_name(kind, scope, round, artifact))
    }

    /// `(scope, round)` for every well-formed round file of `kind`.
    fn scan(&self, kind: RoundKind) -> Vec<(Option<u32>, u32)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Cannot list {}: {}", self.dir.display(), e);
                }
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| {
                let caps = self.pattern.captures(&name)?;
                if &caps[1] != kind.as_str() {
                    return None;
                }
                // Digits that overflow u32 are treated like any other malformed token.
                let scope = match caps.get(2) {
                    Some(m) => Some(m.as_str().parse::<u32>().ok()?),
                    None => None,
                };
                let round = caps[3].parse::<u32>().ok()?;
                Some((scope, round))
            })
            .collect()
    }

    /// Highest round number present for `(kind, scope)`, or 0 when there is none.
    pub fn latest_round(&self, kind: RoundKind, scope: Option<u32>) -> u32 {
        self.scan(kind)
            .into_iter()
            .filter(|(s, _)| *s == scope)
            .map(|(_, round)| round)
            .max()
            .unwrap_or(0)
    }

    /// Perspective indices that have at least one round of `kind`.
    pub fn scopes(&self, kind: RoundKind) -> BTreeSet<u32> {
        self.scan(kind).into_iter().filter_map(|(s, _)| s).collect()
    }

    /// Entries for rounds `1..upto_round`, ascending.
    pub fn history(&self, kind: RoundKind, scope: Option<u32>, upto_round: u32) -> Vec<RoundEntry> {
        (1..upto_round)
            .map(|number| RoundEntry {
                number,
                input: self.read_or_empty(&self.path(kind, scope, number, Artifact::Input)),
                response: self.read_or_empty(&self.path(kind, scope, number, Artifact::Response)),
            })
            .collect()
    }

    fn read_or_empty(&self, path: &Path) -> String {
        match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!("Skipping unreadable round file {}: {}", path.display(), e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir, "discussion-r1-input.md", "first input");
        touch(&dir, "discussion-r1-response.md", "[]");
        touch(&dir, "discussion-r2-input.md", "second input");
        touch(&dir, "interview-p0-r1-input.md", "ask p0");
        touch(&dir, "interview-p2-r3-response.md", "{}");
        dir
    }

    #[test]
    fn latest_round_is_the_maximum_present() {
        let dir = fixture();
        let ledger = RoundLedger::new(dir.path());
        assert_eq!(ledger.latest_round(RoundKind::Discussion, None), 2);
        assert_eq!(ledger.latest_round(RoundKind::Interview, Some(0)), 1);
        assert_eq!(ledger.latest_round(RoundKind::Interview, Some(2)), 3);
        assert_eq!(ledger.latest_round(RoundKind::Interview, Some(1)), 0);
    }

    #[test]
    fn empty_or_missing_directory_has_no_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RoundLedger::new(dir.path());
        assert_eq!(ledger.latest_round(RoundKind::Discussion, None), 0);
        assert!(ledger.history(RoundKind::Discussion, None, 1).is_empty());

        let gone = RoundLedger::new(dir.path().join("nope"));
        assert_eq!(gone.latest_round(RoundKind::Interview, Some(0)), 0);
    }

    #[test]
    fn malformed_names_are_skipped() {
        let dir = fixture();
        touch(&dir, "discussion-rinvalid-input.md", "");
        touch(&dir, "discussion-r-input.md", "");
        touch(&dir, "discussion-r99999999999-input.md", "");
        touch(&dir, "discussion-r7-input.md.bak", "");
        touch(&dir, "discussion-r8-notes.md", "");
        touch(&dir, "interview-pbad-r4-response.md", "");
        let ledger = RoundLedger::new(dir.path());
        assert_eq!(ledger.latest_round(RoundKind::Discussion, None), 2);
        assert_eq!(ledger.latest_round(RoundKind::Interview, Some(2)), 3);
    }

    #[test]
    fn interview_files_do_not_count_as_discussion_rounds() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir, "interview-p0-r5-input.md", "");
        let ledger = RoundLedger::new(dir.path());
        assert_eq!(ledger.latest_round(RoundKind::Discussion, None), 0);
        assert_eq!(ledger.latest_round(RoundKind::Interview, None), 0);
    }

    #[test]
    fn gaps_do_not_hide_later_rounds() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir, "discussion-r1-input.md", "one");
        touch(&dir, "discussion-r3-response.md", "three");
        let ledger = RoundLedger::new(dir.path());
        assert_eq!(ledger.latest_round(RoundKind::Discussion, None), 3);

        let history = ledger.history(RoundKind::Discussion, None, 4);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].input, "one");
        assert!(history[1].input.is_empty() && history[1].response.is_empty());
        assert_eq!(history[1].number, 2);
        assert_eq!(history[2].response, "three");
        assert_eq!(history[2].input, "");
    }

    #[test]
    fn history_has_one_entry_per_prior_round() {
        let dir = fixture();
        let ledger = RoundLedger::new(dir.path());
        let history = ledger.history(RoundKind::Discussion, None, 3);
        assert_eq!(
            history,
            vec![
                RoundEntry {
                    number: 1,
                    input: "first input".into(),
                    response: "[]".into()
                },
                RoundEntry {
                    number: 2,
                    input: "second input".into(),
                    response: String::new()
                },
            ]
        );
    }

    #[test]
    fn repeated_calls_are_identical() {
        let dir = fixture();
        let ledger = RoundLedger::new(dir.path());
        assert_eq!(
            ledger.history(RoundKind::Interview, Some(2), 4),
            ledger.history(RoundKind::Interview, Some(2), 4)
        );
        assert_eq!(
            ledger.scopes(RoundKind::Interview),
            BTreeSet::from([0, 2])
        );
    }

    #[test]
    fn file_names_follow_the_convention() {
        assert_eq!(
            RoundLedger::file_name(RoundKind::Discussion, None, 4, Artifact::Response),
            "discussion-r4-response.md"
        );
        assert_eq!(
            RoundLedger::file_name(RoundKind::Interview, Some(1), 2, Artifact::Input),
            "interview-p1-r2-input.md"
        );
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::TopicSettings;
use crate::error::{ConsError, Result};
use crate::ledger::{Artifact, RoundKind, RoundLedger};
use crate::pipeline::write_atomic;
use crate::types::{Perspective, ResponseModel};

pub const README_FILE: &str = "README.md";
pub const CONFIG_FILE: &str = "cons.toml";
pub const PERSPECTIVES_FILE: &str = "perspectives.json";
pub const CLARIFICATION_FILE: &str = "clarification.json";
pub const BIAS_FILE: &str = "bias_analysis.json";
pub const STRESS_FILE: &str = "stress_analysis.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// The topic every command works on: one directory and its files.
#[derive(Debug, Clone)]
pub struct TopicContext {
    dir: PathBuf,
    ledger: RoundLedger,
}

impl TopicContext {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            ledger: RoundLedger::new(dir.clone()),
            dir,
        }
    }

    /// The override path when given, else the working directory.
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self> {
        let dir = match override_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().map_err(|e| ConsError::io(".", e))?,
        };
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    pub fn readme_file(&self) -> PathBuf {
        self.dir.join(README_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn perspectives_file(&self) -> PathBuf {
        self.dir.join(PERSPECTIVES_FILE)
    }

    pub fn clarification_file(&self) -> PathBuf {
        self.dir.join(CLARIFICATION_FILE)
    }

    pub fn bias_file(&self) -> PathBuf {
        self.dir.join(BIAS_FILE)
    }

    pub fn stress_file(&self) -> PathBuf {
        self.dir.join(STRESS_FILE)
    }

    pub fn summary_file(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    pub fn discussion_file(&self, round: u32, artifact: Artifact) -> PathBuf {
        self.ledger.path(RoundKind::Discussion, None, round, artifact)
    }

    pub fn interview_file(&self, perspective: u32, round: u32, artifact: Artifact) -> PathBuf {
        self.ledger
            .path(RoundKind::Interview, Some(perspective), round, artifact)
    }

    pub fn latest_discussion_round(&self) -> u32 {
        self.ledger.latest_round(RoundKind::Discussion, None)
    }

    pub fn latest_interview_round(&self, perspective: u32) -> u32 {
        self.ledger.latest_round(RoundKind::Interview, Some(perspective))
    }

    /// README text. A topic without a README has not been initialised.
    pub fn description(&self) -> Result<String> {
        let path = self.readme_file();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConsError::missing(format!(
                "No {} in {}. Run 'cons init' first.",
                README_FILE,
                self.dir.display()
            ))),
            Err(e) => Err(ConsError::io(path, e)),
        }
    }

    pub fn settings(&self) -> Result<TopicSettings> {
        Ok(TopicSettings::load(&self.config_file())?)
    }

    /// Stored perspectives; an absent file reads as an empty list.
    pub fn perspectives(&self) -> Result<Vec<Perspective>> {
        let path = self.perspectives_file();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConsError::io(path, e)),
        };
        let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            ConsError::missing(format!(
                "{} is not valid JSON ({}). Regenerate or fix it with 'cons perspectives edit'.",
                path.display(),
                e
            ))
        })?;
        Ok(Vec::<Perspective>::from_json(&value)?)
    }

    /// Perspectives, failing when none have been generated yet.
    pub fn require_perspectives(&self) -> Result<Vec<Perspective>> {
        let perspectives = self.perspectives()?;
        if perspectives.is_empty() {
            return Err(ConsError::missing(
                "No perspectives found. Generate them first with 'cons perspectives generate'.",
            ));
        }
        Ok(perspectives)
    }

    pub fn perspective(&self, index: u32) -> Result<Perspective> {
        let perspectives = self.require_perspectives()?;
        let count = perspectives.len();
        perspectives
            .into_iter()
            .nth(index as usize)
            .ok_or_else(|| {
                ConsError::missing(format!(
                    "Invalid perspective index {}. Choose 0-{}.",
                    index,
                    count - 1
                ))
            })
    }

    pub fn save_perspectives(&self, perspectives: &[Perspective]) -> Result<()> {
        let path = self.perspectives_file();
        let pretty = serde_json::to_string_pretty(perspectives)
            .map_err(|e| ConsError::io(&path, io::Error::other(e)))?;
        write_atomic(&path, &pretty)?;
        info!("Saved {} perspectives to {}", perspectives.len(), path.display());
        Ok(())
    }

    /// The perspective interviewed most: highest latest round, lowest index on ties.
    pub fn most_recent_interview(&self) -> Option<u32> {
        self.ledger
            .scopes(RoundKind::Interview)
            .into_iter()
            .map(|p| (self.latest_interview_round(p), p))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perspective(title: &str) -> Perspective {
        Perspective {
            title: title.to_string(),
            expertise: "e".into(),
            goal: "g".into(),
            role: "r".into(),
        }
    }

    #[test]
    fn paths_live_in_the_topic_directory() {
        let topic = TopicContext::new("/tmp/topic");
        assert_eq!(topic.readme_file(), Path::new("/tmp/topic/README.md"));
        assert_eq!(topic.config_file(), Path::new("/tmp/topic/cons.toml"));
        assert_eq!(
            topic.discussion_file(3, Artifact::Input),
            Path::new("/tmp/topic/discussion-r3-input.md")
        );
        assert_eq!(
            topic.interview_file(1, 2, Artifact::Response),
            Path::new("/tmp/topic/interview-p1-r2-response.md")
        );
    }

    #[test]
    fn description_requires_a_readme() {
        let dir = tempfile::tempdir().unwrap();
        let topic = TopicContext::new(dir.path());
        assert!(matches!(
            topic.description().unwrap_err(),
            ConsError::MissingPrerequisite(_)
        ));
        fs::write(topic.readme_file(), "Should we relocate?").unwrap();
        assert_eq!(topic.description().unwrap(), "Should we relocate?");
    }

    #[test]
    fn perspectives_round_trip_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let topic = TopicContext::new(dir.path());
        assert!(topic.perspectives().unwrap().is_empty());
        assert!(matches!(
            topic.require_perspectives().unwrap_err(),
            ConsError::MissingPrerequisite(_)
        ));

        topic
            .save_perspectives(&[perspective("Economist"), perspective("Engineer")])
            .unwrap();
        assert_eq!(topic.perspective(1).unwrap().title, "Engineer");
        assert!(matches!(
            topic.perspective(5).unwrap_err(),
            ConsError::MissingPrerequisite(_)
        ));
    }

    #[test]
    fn malformed_perspectives_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let topic = TopicContext::new(dir.path());
        fs::write(topic.perspectives_file(), r#"[{"Title": "x"}]"#).unwrap();
        assert!(matches!(
            topic.perspectives().unwrap_err(),
            ConsError::SchemaValidation(_)
        ));
    }

    #[test]
    fn most_recent_interview_prefers_highest_round() {
        let dir = tempfile::tempdir().unwrap();
        let topic = TopicContext::new(dir.path());
        assert_eq!(topic.most_recent_interview(), None);

        fs::write(topic.interview_file(0, 1, Artifact::Input), "a").unwrap();
        fs::write(topic.interview_file(3, 2, Artifact::Input), "b").unwrap();
        fs::write(topic.interview_file(1, 2, Artifact::Input), "c").unwrap();
        assert_eq!(topic.most_recent_interview(), Some(1));
    }
}

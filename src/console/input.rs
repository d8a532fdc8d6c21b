use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::KeyBindings;
use crate::error::{ConsError, Result};
use crate::pipeline::InputSource;

/// Prompt the user with a custom message and return the entered line (trimmed)
pub async fn prompt_user(prompt_text: &str) -> Result<String> {
    print!("{}", prompt_text);
    std::io::stdout()
        .flush()
        .map_err(|e| ConsError::io("<stdout>", e))?;

    let mut reader = BufReader::new(io::stdin());
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| ConsError::io("<stdin>", e))?;
    Ok(line.trim().to_string())
}

/// Yes/no question; an empty answer takes `default`.
pub async fn confirm(question: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = prompt_user(&format!("{} {} ", question, hint)).await?;
    Ok(parse_yes_no(&answer).unwrap_or(default))
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Editor command: `$VISUAL`, then `$EDITOR`, then the key-binding fallback.
pub fn resolve_editor(key_bindings: KeyBindings) -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| key_bindings.fallback_editor().to_string())
}

/// Text entry through an external editor on a temporary Markdown file.
#[derive(Debug, Clone)]
pub struct EditorInput {
    command: String,
}

impl EditorInput {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_key_bindings(key_bindings: KeyBindings) -> Self {
        Self::new(resolve_editor(key_bindings))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the editor on `paths` and wait for it. `false` when it failed.
    pub async fn open(&self, paths: &[PathBuf]) -> Result<bool> {
        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            warn!("Editor command is empty");
            return Ok(false);
        };

        debug!("Opening {:?} with {}", paths, self.command);
        let status = Command::new(program)
            .args(parts)
            .args(paths)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(true),
            Ok(status) => {
                warn!("Editor '{}' exited with {}", self.command, status);
                Ok(false)
            }
            Err(e) => {
                warn!("Cannot start editor '{}': {}", self.command, e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl InputSource for EditorInput {
    async fn edit(&self, prefill: &str) -> Result<Option<String>> {
        let file = tempfile::Builder::new()
            .prefix("cons-")
            .suffix(".md")
            .tempfile()
            .map_err(|e| ConsError::io(env::temp_dir(), e))?;
        let path = file.path().to_path_buf();
        tokio::fs::write(&path, prefill)
            .await
            .map_err(|e| ConsError::io(&path, e))?;

        if !self.open(std::slice::from_ref(&path)).await? {
            return Ok(None);
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConsError::io(&path, e))?;
        Ok(accept_edit(prefill, text))
    }
}

/// Unchanged or blank editor content counts as abandoned.
fn accept_edit(prefill: &str, text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == prefill.trim() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads all of standard input, for scripted use.
#[derive(Debug, Clone, Default)]
pub struct StdinInput;

#[async_trait]
impl InputSource for StdinInput {
    async fn edit(&self, _prefill: &str) -> Result<Option<String>> {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .await
            .map_err(|e| ConsError::io("<stdin>", e))?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

/// True when `path` is worth handing to the editor.
pub fn editable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_answers() {
        assert_eq!(parse_yes_no("Y"), Some(true));
        assert_eq!(parse_yes_no(" no "), Some(false));
        assert_eq!(parse_yes_no(""), None);
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn unchanged_or_blank_edits_are_abandoned() {
        assert_eq!(accept_edit("# Guidance\n", "# Guidance\n".into()), None);
        assert_eq!(accept_edit("# Guidance\n", "  \n".into()), None);
        assert_eq!(
            accept_edit("# Guidance\n", "# Guidance\n\nFocus on cost\n".into()),
            Some("# Guidance\n\nFocus on cost".to_string())
        );
    }

    #[tokio::test]
    async fn failing_editor_abandons_the_edit() {
        let editor = EditorInput::new("false");
        assert_eq!(editor.edit("prefill").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_editor_binary_abandons_the_edit() {
        let editor = EditorInput::new("cons-no-such-editor-binary");
        assert_eq!(editor.edit("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn editor_output_is_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-editor.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'Focus on cost' >> \"$1\"\n").unwrap();
        let editor = EditorInput::new(format!("sh {}", script.display()));

        let text = editor.edit("# Guidance\n").await.unwrap();
        assert_eq!(text.as_deref(), Some("# Guidance\nFocus on cost"));
    }
}

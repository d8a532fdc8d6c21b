//! One module per `cons` subcommand.
//!
//! Commands that talk to the model run through a [`Session`]; the rest only
//! need the topic directory and an editor.

pub mod analysis;
pub mod discuss;
pub mod init;
pub mod interview;
pub mod perspectives;

use std::path::PathBuf;

use crate::console::{Console, EditorInput};
use crate::error::{ConsError, Result};
use crate::pipeline::Executor;
use crate::prompts::PromptAssembler;
use crate::topic::TopicContext;

/// Everything a model-backed command needs for one invocation.
pub struct Session {
    pub topic: TopicContext,
    pub prompts: PromptAssembler,
    pub executor: Executor,
    pub editor: EditorInput,
    /// False when input comes from stdin; follow-up questions are skipped.
    pub interactive: bool,
}

/// `cons edit`: open the topic README.
pub async fn edit_description(topic: &TopicContext, editor: &EditorInput) -> Result<()> {
    let readme = topic.readme_file();
    if !readme.is_file() {
        return Err(ConsError::missing(format!(
            "No README.md in {}. Run 'cons init' first.",
            topic.dir().display()
        )));
    }
    open_in_editor(editor, vec![readme]).await
}

pub(crate) async fn open_in_editor(editor: &EditorInput, files: Vec<PathBuf>) -> Result<()> {
    if !editor.open(&files).await? {
        Console::display_warning(&format!(
            "Editor '{}' did not finish cleanly; changes may not be saved.",
            editor.command()
        ));
    }
    Ok(())
}

use std::path::Path;

use crate::error::Result;
use crate::types::{Perspective, ResponseModel};

mod input;
mod render;

pub use input::{EditorInput, StdinInput, editable};

/// Terminal front-end shared by every command
pub struct Console;

impl Console {
    /// Display a welcome banner naming the topic directory
    pub fn display_welcome(topic: &Path) {
        render::display_welcome(topic);
    }

    /// Prompt the user with a custom message and return the entered line (trimmed)
    pub async fn prompt_user(prompt_text: &str) -> Result<String> {
        input::prompt_user(prompt_text).await
    }

    pub async fn confirm(question: &str, default: bool) -> Result<bool> {
        input::confirm(question, default).await
    }

    pub fn display_loading(what: &str) {
        render::display_loading(what);
    }

    pub fn display_info(message: &str) {
        render::display_info(message);
    }

    pub fn display_warning(message: &str) {
        render::display_warning(message);
    }

    pub fn display_saved(path: &Path) {
        render::display_saved(path);
    }

    /// Render any response model as styled Markdown
    pub fn display_response<R: ResponseModel>(response: &R) {
        render::display_markdown(&response.to_markdown());
    }

    pub fn display_perspectives(perspectives: &[Perspective]) {
        render::display_perspectives(perspectives);
    }

    /// Display an error message with context-aware messaging
    pub fn display_error(error: &anyhow::Error) {
        render::display_error(error);
    }
}

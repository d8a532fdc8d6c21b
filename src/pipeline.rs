use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ConsError, Result, Stage};
use crate::llm::{CompletionRequest, LlmProvider};
use crate::types::ResponseModel;

/// Interactive text entry. `Ok(None)` means the user abandoned the edit.
#[async_trait]
pub trait InputSource: Send + Sync {
    async fn edit(&self, prefill: &str) -> Result<Option<String>>;
}

/// Where a command's free-text input comes from.
#[derive(Debug, Clone)]
pub struct InputRequest {
    /// Reused when it exists; written after a fresh edit otherwise.
    pub file: Option<PathBuf>,
    pub prefill: String,
}

impl InputRequest {
    pub fn new(file: impl Into<PathBuf>, prefill: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            prefill: prefill.into(),
        }
    }

    pub fn unsaved(prefill: impl Into<String>) -> Self {
        Self {
            file: None,
            prefill: prefill.into(),
        }
    }
}

/// Runs one command round: input, prompt, model call, persist, display.
pub struct Executor {
    llm: Box<dyn LlmProvider>,
    input: Box<dyn InputSource>,
    system_prompt: String,
    temperature: f32,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(
        llm: Box<dyn LlmProvider>,
        input: Box<dyn InputSource>,
        system_prompt: String,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            input,
            system_prompt,
            temperature,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Waits for `answer` unless the session is cancelled first, which
    /// counts as abandoned input.
    pub async fn unless_cancelled<T>(
        &self,
        answer: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ConsError::NoInputProvided),
            result = answer => result,
        }
    }

    /// Reads the saved input or asks for it. No request means empty input.
    pub async fn gather_input(&self, request: Option<&InputRequest>) -> Result<String> {
        let Some(request) = request else {
            return Ok(String::new());
        };

        if let Some(path) = &request.file
            && path.exists()
        {
            info!("Executor: reusing saved input {}", path.display());
            return fs::read_to_string(path)
                .map_err(|e| ConsError::io(path, e).at(Stage::ReadInput));
        }

        let text = match self.unless_cancelled(self.input.edit(&request.prefill)).await? {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(ConsError::NoInputProvided),
        };

        if let Some(path) = &request.file {
            write_atomic(path, &text).map_err(|e| e.at(Stage::ReadInput))?;
            debug!("Executor: user input saved to {}", path.display());
        }
        Ok(text)
    }

    /// Steps up to and including validation; nothing is written besides the input file.
    pub async fn run<R, B>(&self, input: Option<InputRequest>, build_prompt: B) -> Result<R>
    where
        R: ResponseModel,
        B: FnOnce(&str) -> Result<String>,
    {
        let user_input = self.gather_input(input.as_ref()).await?;

        let prompt = build_prompt(&user_input).map_err(|e| e.at(Stage::BuildPrompt))?;
        debug!("Executor: prompt generated:\n{}", prompt);

        let request = CompletionRequest {
            system: self.system_prompt.clone(),
            prompt,
            schema: R::schema(),
            temperature: self.temperature,
        };
        info!("Executor: requesting {} from the model", R::name());
        let raw = self
            .llm
            .complete(request, &self.cancel)
            .await
            .map_err(|e| ConsError::from(e).at(Stage::CallModel))?;
        debug!("Executor: response received: {}", raw);

        R::from_json(&raw).map_err(|e| ConsError::from(e).at(Stage::CallModel))
    }

    /// Replace `path` with the pretty-printed response.
    pub fn persist<R: ResponseModel>(&self, response: &R, path: &Path) -> Result<()> {
        let pretty = serde_json::to_string_pretty(response)
            .map_err(|e| ConsError::io(path, io::Error::other(e)).at(Stage::SaveResponse))?;
        write_atomic(path, &pretty).map_err(|e| e.at(Stage::SaveResponse))?;
        info!("Executor: saved {} to {}", R::name(), path.display());
        Ok(())
    }

    pub async fn execute<R, B, D>(
        &self,
        input: Option<InputRequest>,
        build_prompt: B,
        response_file: &Path,
        display: D,
    ) -> Result<R>
    where
        R: ResponseModel,
        B: FnOnce(&str) -> Result<String>,
        D: FnOnce(&R),
    {
        let response: R = self.run(input, build_prompt).await?;
        self.persist(&response, response_file)?;
        display(&response);
        Ok(response)
    }
}

/// Write through a temp file in the target directory, then rename over `path`.
/// An existing file keeps its permissions; a new one gets the umask default.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| ConsError::io(dir, e))?;

    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Masked by the umask at creation, like a plain `fs::write`.
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(|e| ConsError::io(dir, e))?;
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| ConsError::io(tmp.path(), e))?;
    }
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ConsError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| ConsError::io(path, e.error))?;
    Ok(())
}

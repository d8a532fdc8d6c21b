//! Scripted collaborators for pipeline and command tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::commands::Session;
use crate::console::EditorInput;
use crate::error::Result;
use crate::llm::{CompletionRequest, LlmError, LlmProvider};
use crate::pipeline::{Executor, InputSource};
use crate::prompts::PromptAssembler;
use crate::topic::TopicContext;

/// Answers completions from a queue and records every request.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    replies: Arc<Mutex<VecDeque<Result<JsonValue, LlmError>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<JsonValue, LlmError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(
        &self,
        request: CompletionRequest,
        _cancel: &CancellationToken,
    ) -> std::result::Result<JsonValue, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ParseError {
                message: "no scripted reply left".into(),
            }))
    }
}

/// Returns the same edit result every time and records the prefills it was shown.
#[derive(Clone, Default)]
pub struct ScriptedInput {
    reply: Option<String>,
    prefills: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInput {
    pub fn reply(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            prefills: Arc::default(),
        }
    }

    pub fn abandon() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.prefills.lock().unwrap().len()
    }

    pub fn prefills(&self) -> Vec<String> {
        self.prefills.lock().unwrap().clone()
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn edit(&self, prefill: &str) -> Result<Option<String>> {
        self.prefills.lock().unwrap().push(prefill.to_string());
        Ok(self.reply.clone())
    }
}

/// A non-interactive session on `dir` backed by the scripted collaborators.
pub fn session_in(dir: &Path, llm: &ScriptedLlm, input: &ScriptedInput) -> Session {
    let prompts = PromptAssembler::new().unwrap();
    let system = prompts.system().unwrap();
    Session {
        topic: TopicContext::new(dir),
        executor: Executor::new(Box::new(llm.clone()), Box::new(input.clone()), system, 1.0),
        prompts,
        editor: EditorInput::new("true"),
        interactive: false,
    }
}

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;

/// Shape mismatch between a model response and the record it should fill.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{model}.{field}: {reason}")]
pub struct SchemaError {
    pub model: String,
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(model: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Step of the execution pipeline that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadInput,
    BuildPrompt,
    CallModel,
    SaveResponse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ReadInput => "reading input",
            Stage::BuildPrompt => "building prompt",
            Stage::CallModel => "calling the model",
            Stage::SaveResponse => "saving the response",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ConsError {
    #[error("{0}")]
    MissingPrerequisite(String),

    #[error("Response does not match the expected shape: {0}")]
    SchemaValidation(#[from] SchemaError),

    #[error("No input provided")]
    NoInputProvided,

    #[error(transparent)]
    Transport(#[from] LlmError),

    #[error("Failed to access {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to render template '{name}': {reason}")]
    Template { name: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed while {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ConsError>,
    },
}

pub type Result<T, E = ConsError> = std::result::Result<T, E>;

impl ConsError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        ConsError::FileIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn missing(message: impl Into<String>) -> Self {
        ConsError::MissingPrerequisite(message.into())
    }

    /// Tag the error with the pipeline stage it came from.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            already @ ConsError::Stage { .. } => already,
            other => ConsError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, with stage wrappers removed.
    pub fn root(&self) -> &ConsError {
        match self {
            ConsError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            ConsError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

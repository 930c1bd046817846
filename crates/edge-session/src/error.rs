use std::path::PathBuf;

use edge_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("backend is not initialized or has been shut down")]
    BackendNotReady,
    #[error("failed to load model from {}: {source}", .path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("failed to create context: {0}")]
    ContextCreation(String),
    #[error("failed to tokenize prompt: {0}")]
    Tokenization(String),
    #[error("prompt decode failed in the batch starting at position {position}: {source}")]
    PromptDecode {
        position: usize,
        #[source]
        source: ModelError,
    },
    #[error("no model is loaded")]
    InvalidState,
}

pub type Result<T> = std::result::Result<T, SessionError>;

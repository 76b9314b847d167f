use ib_engine::EngineError;
use thiserror::Error;

use crate::options::ContextMode;

#[derive(Error, Debug)]
pub enum Error {
    #[error("model is not loaded")]
    NotLoaded,
    #[error("resource has already been released")]
    Released,
    #[error("model is already loaded")]
    AlreadyLoaded,
    #[error("Failed to load model: {0}")]
    Load(#[source] EngineError),
    #[error("Failed to create context: {0}")]
    Create(#[source] EngineError),
    #[error("Context not configured for {expected}")]
    ModeMismatch { expected: ContextMode },
    #[error("Failed to process text (tokenize status {status})")]
    Tokenize { status: i32 },
    #[error("Failed to convert tokens to text (detokenize status {status})")]
    Detokenize { status: i32 },
    #[error("decode failed with status {status}")]
    Decode { status: i32 },
    #[error("No logits available")]
    LogitsUnavailable,
    #[error("Failed to get embeddings")]
    EmbeddingUnavailable,
    #[error("input produced no tokens")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, Error>;

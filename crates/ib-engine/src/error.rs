use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
    #[error("invalid model descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("failed to allocate context: {0}")]
    ContextAlloc(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

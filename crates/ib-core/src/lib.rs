//! Inference bridge: loads models through an engine [`Backend`], converts
//! between text and tokens, and runs embedding and generation requests against
//! reference-counted model and context handles.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ib_core::{Context, ContextOptions, GenerateOptions, Model, ModelOptions, TokenizeOptions};
//! use ib_engine::RefBackend;
//!
//! let model = Model::create(Arc::new(RefBackend::new()), ModelOptions::default());
//! model.load("model.json")?;
//! let ctx = Context::create(&model, ContextOptions::default())?;
//! let text = ctx.generate("Once upon a time", GenerateOptions::default(), TokenizeOptions::default())?;
//! println!("{text}");
//! ctx.destroy();
//! model.destroy();
//! # Ok::<(), ib_core::Error>(())
//! ```
//!
//! [`Backend`]: ib_engine::Backend

pub mod batch;
pub mod codec;
pub mod context;
pub mod embed;
pub mod error;
pub mod generate;
pub mod handle;
pub mod logging;
pub mod model;
pub mod options;
pub mod session;

#[cfg(test)]
mod testing;

pub use batch::{BatchBuilder, OutputMask};
pub use context::Context;
pub use error::{Error, Result};
pub use generate::{Completion, GeneratedText, StopReason};
pub use handle::{Release, ResourceHandle, Retained};
pub use logging::{LogConfig, LogLevel};
pub use model::{Model, ModelMetadata};
pub use options::{
    ContextMode, ContextOptions, DetokenizeOptions, GenerateOptions, ModelOptions,
    TokenizeOptions,
};
pub use session::{ContextRequest, Session, SessionMetadata, SessionOptions};

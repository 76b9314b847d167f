//! Engine boundary for the inference bridge.
//!
//! [`Backend`], [`NativeModel`] and [`NativeContext`] describe the operations
//! the bridge needs from a language-model runtime. [`reference`] implements
//! them on the CPU.

pub mod batch;
pub mod error;
pub mod native;
pub mod reference;
pub mod tokenizer;

pub use batch::{Batch, Pos, SeqId, TokenId};
pub use error::{EngineError, Result};
pub use native::{Backend, ContextParams, NativeContext, NativeModel, PoolingType};
pub use reference::{ModelDescriptor, RefBackend};

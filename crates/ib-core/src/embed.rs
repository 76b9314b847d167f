//! Text embedding against an embedding-mode context.

use ib_engine::{NativeContext, NativeModel, PoolingType};
use tracing::debug;

use crate::batch::{BatchBuilder, OutputMask};
use crate::codec;
use crate::error::{Error, Result};
use crate::options::TokenizeOptions;

/// Embed `text` as one vector of the model's embedding width.
///
/// Reads the pooled vector of sequence 0 when the context pools, falling back
/// to the raw buffer of the last position.
pub fn run(
    model: &dyn NativeModel,
    ctx: &mut dyn NativeContext,
    text: &str,
    options: TokenizeOptions,
) -> Result<Vec<f64>> {
    let tokens = codec::tokenize(model, text, options)?;
    if tokens.is_empty() {
        return Err(Error::EmptyInput);
    }

    let batch = BatchBuilder::build(&tokens, 0, OutputMask::LastOnly);
    let status = ctx.decode(&batch);
    if status != 0 {
        return Err(Error::Decode { status });
    }
    ctx.synchronize();

    let pooling = ctx.pooling_type();
    let pooled = match pooling {
        PoolingType::None => None,
        _ => ctx.embeddings_seq(0),
    };
    let values = pooled
        .or_else(|| ctx.embeddings())
        .ok_or(Error::EmbeddingUnavailable)?;

    let n_embd = model.n_embd();
    let values = values.get(..n_embd).ok_or(Error::EmbeddingUnavailable)?;

    debug!(n_tokens = tokens.len(), n_embd, ?pooling, "encoded text");
    Ok(values.iter().map(|&v| f64::from(v)).collect())
}

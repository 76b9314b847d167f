//! Autoregressive text generation against a generation-mode context.

use ib_engine::{NativeContext, NativeModel, TokenId};
use ib_sampler::{top_k_temperature_chain, SamplerChain};
use serde::Serialize;
use tracing::{debug, warn};

use crate::batch::{BatchBuilder, OutputMask};
use crate::codec;
use crate::error::{Error, Result};
use crate::options::{GenerateOptions, TokenizeOptions};

/// Draws allowed to replace an unrenderable token before giving up.
pub const RESAMPLE_ATTEMPTS: usize = 50;

/// Starting capacity of the output buffer, in bytes.
pub const INITIAL_TEXT_CAPACITY: usize = 1024;

/// Why generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// The model produced its end-of-sequence token.
    EndOfSequence,
    /// `maxTokens` fragments were produced.
    TokenBudget,
    /// A step's decode failed; text up to that step is kept.
    DecodeFailed,
    /// No renderable token was found within the resample budget.
    Unrenderable,
}

/// Result of a generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub text: String,
    /// Ids of the tokens whose text was appended, in order.
    pub tokens: Vec<TokenId>,
    pub stop: StopReason,
}

/// Growable output buffer. Capacity doubles whenever an append would fill it.
pub struct GeneratedText {
    bytes: Vec<u8>,
    tokens: Vec<TokenId>,
}

impl GeneratedText {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_TEXT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity.max(1)),
            tokens: Vec::new(),
        }
    }

    /// Append the rendered bytes of `token`.
    pub fn push(&mut self, token: TokenId, piece: &[u8]) {
        let needed = self.bytes.len() + piece.len();
        if needed >= self.bytes.capacity() {
            let mut capacity = self.bytes.capacity().max(1);
            while needed >= capacity {
                capacity *= 2;
            }
            self.bytes.reserve_exact(capacity - self.bytes.len());
        }
        self.bytes.extend_from_slice(piece);
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn finish(self, stop: StopReason) -> Completion {
        Completion {
            text: codec::into_text(self.bytes),
            tokens: self.tokens,
            stop,
        }
    }
}

impl Default for GeneratedText {
    fn default() -> Self {
        Self::new()
    }
}

/// Redraw from the same logits until a token other than EOS renders.
fn resample(
    chain: &mut SamplerChain,
    logits: &[f32],
    model: &dyn NativeModel,
    eos: TokenId,
) -> Option<(TokenId, Vec<u8>)> {
    for _ in 0..RESAMPLE_ATTEMPTS {
        let token = chain.sample(logits)?;
        if token == eos {
            continue;
        }
        if let Some(bytes) = codec::piece(model, token, true) {
            return Some((token, bytes));
        }
    }
    None
}

/// Generate up to `options.max_tokens` fragments following `prompt`.
///
/// The first token is sampled from the prompt's last position and appended
/// as is: it is neither checked against EOS nor resampled. Each later token
/// is fed back through a one-token decode.
pub fn run(
    model: &dyn NativeModel,
    ctx: &mut dyn NativeContext,
    prompt: &str,
    options: GenerateOptions,
    tokenize: TokenizeOptions,
) -> Result<Completion> {
    let prompt_tokens = codec::tokenize(model, prompt, tokenize)?;
    if prompt_tokens.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut out = GeneratedText::new();
    if options.max_tokens == 0 {
        return Ok(out.finish(StopReason::TokenBudget));
    }

    let n_prompt = prompt_tokens.len() as i32;
    let batch = BatchBuilder::build(&prompt_tokens, 0, OutputMask::LastOnly);
    let status = ctx.decode(&batch);
    if status != 0 {
        return Err(Error::Decode { status });
    }
    ctx.synchronize();

    let mut chain = top_k_temperature_chain(options.top_k, options.temperature, options.seed);
    let eos = model.token_eos();

    let logits = ctx.logits_ith(n_prompt - 1).ok_or(Error::LogitsUnavailable)?;
    let first = chain.sample(logits).ok_or(Error::LogitsUnavailable)?;
    if let Some(bytes) = codec::piece(model, first, true) {
        out.push(first, &bytes);
    }

    let mut prev = first;
    let mut stop = StopReason::TokenBudget;

    for step in 1..options.max_tokens {
        let pos = n_prompt + step as i32 - 1;
        let status = ctx.decode(&BatchBuilder::step(prev, pos));
        if status != 0 {
            warn!(status, step, "decode failed mid-generation, truncating");
            stop = StopReason::DecodeFailed;
            break;
        }
        ctx.synchronize();

        let Some(logits) = ctx.logits_ith(0) else {
            warn!(step, "no logits after decode, truncating");
            stop = StopReason::DecodeFailed;
            break;
        };
        let Some(token) = chain.sample(logits) else {
            stop = StopReason::DecodeFailed;
            break;
        };
        if token == eos {
            stop = StopReason::EndOfSequence;
            break;
        }

        let rendered = match codec::piece(model, token, true) {
            Some(bytes) => Some((token, bytes)),
            None => resample(&mut chain, logits, model, eos),
        };
        match rendered {
            Some((token, bytes)) => {
                out.push(token, &bytes);
                prev = token;
            }
            None => {
                warn!(step, attempts = RESAMPLE_ATTEMPTS, "no renderable token, truncating");
                stop = StopReason::Unrenderable;
                break;
            }
        }
    }

    debug!(n_prompt, generated = out.tokens.len(), bytes = out.len(), ?stop, "generation finished");
    Ok(out.finish(stop))
}

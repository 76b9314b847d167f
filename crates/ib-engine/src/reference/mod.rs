//! Deterministic CPU engine.
//!
//! Models are JSON descriptors ([`ModelDescriptor`]); weights are generated
//! from the descriptor's seed, so a descriptor always yields the same logits.

pub mod cache;
pub mod context;
pub mod descriptor;
pub mod kernels;

pub use context::RefContext;
pub use descriptor::ModelDescriptor;

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::batch::TokenId;
use crate::error::{EngineError, Result};
use crate::native::{Backend, ContextParams, NativeContext, NativeModel, PoolingType};
use crate::tokenizer::{BpeTokenizer, Vocab};

/// Most cache floats a single context may allocate.
const MAX_CACHE_FLOATS: usize = 1 << 28;

/// Token embedding matrix, also used as the output projection (tied weights).
pub struct Weights {
    pub n_vocab: usize,
    pub n_embd: usize,
    /// Shape `[n_vocab, n_embd]`, row-major.
    pub token_embd: Vec<f32>,
}

impl Weights {
    /// Uniform weights in `[-1, 1)` drawn from a seeded generator.
    pub fn generate(n_vocab: usize, n_embd: usize, seed: u64) -> Weights {
        let mut rng = StdRng::seed_from_u64(seed);
        let token_embd = (0..n_vocab * n_embd)
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        Weights {
            n_vocab,
            n_embd,
            token_embd,
        }
    }

    /// Embedding row of `token`. The caller checks the id is in range.
    pub fn embedding(&self, token: TokenId) -> &[f32] {
        let offset = token as usize * self.n_embd;
        &self.token_embd[offset..offset + self.n_embd]
    }
}

/// Copy `src` into `out` if it fits, following the size-then-fill protocol.
fn write_or_size<T: Copy>(src: &[T], out: Option<&mut [T]>) -> i32 {
    if src.is_empty() {
        return 0;
    }
    let n = i32::try_from(src.len()).unwrap_or(i32::MAX);
    match out {
        Some(buf) if buf.len() >= src.len() => {
            buf[..src.len()].copy_from_slice(src);
            n
        }
        _ => -n,
    }
}

/// A loaded reference model.
pub struct RefModel {
    tokenizer: BpeTokenizer,
    weights: Arc<Weights>,
    n_ctx_train: u32,
    pooling: PoolingType,
}

impl RefModel {
    /// Build a model from a descriptor, validating it first.
    pub fn from_descriptor(descriptor: &ModelDescriptor) -> Result<RefModel> {
        descriptor.validate()?;
        let vocab = Vocab::new(&descriptor.tokens)?;
        let n_vocab = vocab.len();
        let tokenizer = BpeTokenizer::new(vocab, &descriptor.merges)?;
        let weights = Weights::generate(n_vocab, descriptor.n_embd, descriptor.seed);

        Ok(RefModel {
            tokenizer,
            weights: Arc::new(weights),
            n_ctx_train: descriptor.n_ctx_train,
            pooling: descriptor.pooling,
        })
    }

    pub fn tokenizer(&self) -> &BpeTokenizer {
        &self.tokenizer
    }
}

impl NativeModel for RefModel {
    fn n_vocab(&self) -> usize {
        self.weights.n_vocab
    }

    fn n_embd(&self) -> usize {
        self.weights.n_embd
    }

    fn n_ctx_train(&self) -> u32 {
        self.n_ctx_train
    }

    fn n_params(&self) -> u64 {
        self.weights.token_embd.len() as u64
    }

    fn token_bos(&self) -> TokenId {
        self.tokenizer.bos_id()
    }

    fn token_eos(&self) -> TokenId {
        self.tokenizer.eos_id()
    }

    fn tokenize(
        &self,
        text: &str,
        out: Option<&mut [TokenId]>,
        add_special: bool,
        parse_special: bool,
    ) -> i32 {
        let mut ids = Vec::with_capacity(text.len() + 1);
        if add_special {
            ids.push(self.tokenizer.bos_id());
        }
        ids.extend(self.tokenizer.encode(text, parse_special));
        write_or_size(&ids, out)
    }

    fn detokenize(
        &self,
        tokens: &[TokenId],
        out: Option<&mut [u8]>,
        remove_special: bool,
        unparse_special: bool,
    ) -> i32 {
        let bytes = self.tokenizer.decode(tokens, remove_special, unparse_special);
        write_or_size(&bytes, out)
    }

    fn token_to_piece(
        &self,
        token: TokenId,
        out: Option<&mut [u8]>,
        lstrip: usize,
        special: bool,
    ) -> i32 {
        let bytes = self.tokenizer.piece(token, special);
        let skip = bytes.iter().take(lstrip).take_while(|&&b| b == b' ').count();
        write_or_size(&bytes[skip..], out)
    }

    fn new_context(&self, params: &ContextParams) -> Result<Box<dyn NativeContext>> {
        if params.n_ctx == 0 || params.n_batch == 0 {
            return Err(EngineError::ContextAlloc(format!(
                "n_ctx and n_batch must be positive (n_ctx={}, n_batch={})",
                params.n_ctx, params.n_batch
            )));
        }
        let floats = (params.n_ctx as usize).saturating_mul(self.weights.n_embd);
        if floats > MAX_CACHE_FLOATS {
            return Err(EngineError::ContextAlloc(format!(
                "cache of {} x {} exceeds the allocation limit",
                params.n_ctx, self.weights.n_embd
            )));
        }

        let n_batch = params.n_batch.min(params.n_ctx);
        let pooling = match params.pooling {
            PoolingType::Unspecified => self.pooling,
            p => p,
        };
        debug!(
            n_ctx = params.n_ctx,
            n_batch,
            embeddings = params.embeddings,
            ?pooling,
            "allocating reference context"
        );

        Ok(Box::new(RefContext::new(
            Arc::clone(&self.weights),
            params.n_ctx,
            n_batch,
            params.embeddings,
            pooling,
        )))
    }
}

/// Loads [`RefModel`]s from descriptor files.
#[derive(Debug, Clone, Default)]
pub struct RefBackend;

impl RefBackend {
    pub fn new() -> Self {
        RefBackend
    }
}

impl Backend for RefBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn load_model(&self, path: &Path) -> Result<Box<dyn NativeModel>> {
        let descriptor = ModelDescriptor::from_path(path)?;
        let model = RefModel::from_descriptor(&descriptor)?;
        info!(
            path = %path.display(),
            n_vocab = model.n_vocab(),
            n_embd = model.n_embd(),
            "loaded reference model"
        );
        Ok(Box::new(model))
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::{Batch, SeqId, TokenId};
use crate::error::Result;

/// How per-token embeddings are reduced to one vector per sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolingType {
    /// Use the model's own default.
    #[default]
    Unspecified,
    None,
    Mean,
    Cls,
    Last,
}

/// Parameters for allocating evaluation state against a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextParams {
    /// Maximum sequence length (cache slots).
    pub n_ctx: u32,
    /// Maximum number of tokens accepted by one `decode` call.
    pub n_batch: u32,
    /// Produce embeddings instead of logits.
    pub embeddings: bool,
    pub pooling: PoolingType,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            n_ctx: 512,
            n_batch: 512,
            embeddings: false,
            pooling: PoolingType::Unspecified,
        }
    }
}

/// Entry point of an inference engine: turns a model path into a model.
pub trait Backend: Send + Sync {
    /// Returns the name of this engine (e.g. "reference").
    fn name(&self) -> &str;

    /// Load weights and vocabulary from `path`.
    fn load_model(&self, path: &Path) -> Result<Box<dyn NativeModel>>;
}

/// Immutable weights plus tokenizer tables.
///
/// The text conversion methods follow a size-then-fill protocol: when `out` is
/// `None` or too small, nothing is written and the negated required length is
/// returned; otherwise the number of elements written is returned. A return of
/// zero means there was nothing to write.
pub trait NativeModel: Send + Sync {
    fn n_vocab(&self) -> usize;

    /// Embedding dimensionality.
    fn n_embd(&self) -> usize;

    /// Context length the model was trained with.
    fn n_ctx_train(&self) -> u32;

    /// Total number of weight parameters.
    fn n_params(&self) -> u64;

    fn token_bos(&self) -> TokenId;

    fn token_eos(&self) -> TokenId;

    /// Convert UTF-8 text into token ids.
    ///
    /// `add_special` prepends the beginning-of-sequence marker; `parse_special`
    /// lets special token texts in `text` map to their control tokens.
    fn tokenize(
        &self,
        text: &str,
        out: Option<&mut [TokenId]>,
        add_special: bool,
        parse_special: bool,
    ) -> i32;

    /// Convert token ids back into UTF-8 bytes.
    ///
    /// `remove_special` drops a leading BOS and trailing EOS; `unparse_special`
    /// renders control tokens as their text instead of nothing.
    fn detokenize(
        &self,
        tokens: &[TokenId],
        out: Option<&mut [u8]>,
        remove_special: bool,
        unparse_special: bool,
    ) -> i32;

    /// Render one token's display bytes, skipping up to `lstrip` leading spaces.
    ///
    /// Tokens with no display form yield zero.
    fn token_to_piece(
        &self,
        token: TokenId,
        out: Option<&mut [u8]>,
        lstrip: usize,
        special: bool,
    ) -> i32;

    /// Allocate evaluation state bound to this model.
    fn new_context(&self, params: &ContextParams) -> Result<Box<dyn NativeContext>>;
}

/// Mutable evaluation state (cache plus output buffers) for one model.
pub trait NativeContext: Send + Sync {
    fn n_ctx(&self) -> u32;

    fn n_batch(&self) -> u32;

    /// Effective pooling mode (never `Unspecified`).
    fn pooling_type(&self) -> PoolingType;

    /// Run a forward pass over `batch`. Returns 0 on success, a positive
    /// status when no cache slot is available, negative on invalid input.
    fn decode(&mut self, batch: &Batch) -> i32;

    /// Block until all submitted work has completed.
    fn synchronize(&mut self);

    /// Logits for batch slot `i` of the last decode; negative `i` counts back
    /// from the last output.
    fn logits_ith(&self, i: i32) -> Option<&[f32]>;

    /// Unpooled embeddings of every output slot of the last decode.
    fn embeddings(&self) -> Option<&[f32]>;

    /// Pooled embedding of sequence `seq` from the last decode.
    fn embeddings_seq(&self, seq: SeqId) -> Option<&[f32]>;
}

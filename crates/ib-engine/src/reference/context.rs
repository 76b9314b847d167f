use std::sync::Arc;

use tracing::trace;

use super::cache::HiddenCache;
use super::kernels;
use super::Weights;
use crate::batch::{Batch, SeqId};
use crate::native::{NativeContext, PoolingType};

/// Status returned for a malformed batch.
pub const DECODE_INVALID: i32 = -1;
/// Status returned when the batch runs past the end of the cache.
pub const DECODE_NO_SLOT: i32 = 1;

/// Evaluation state of the reference engine.
///
/// Each position's hidden state is the RMS-normalized sum of its token
/// embedding and the mean of every cached embedding up to and including it.
/// Logits are the tied embedding matrix applied to that hidden state.
pub struct RefContext {
    weights: Arc<Weights>,
    cache: HiddenCache,
    n_ctx: u32,
    n_batch: u32,
    embeddings: bool,
    pooling: PoolingType,
    /// Output row for each slot of the last batch, if its output was requested.
    output_ids: Vec<Option<usize>>,
    n_outputs: usize,
    /// `[n_outputs, n_vocab]`, generation mode only.
    logits: Vec<f32>,
    /// `[n_outputs, n_embd]`, embedding mode only.
    embd: Vec<f32>,
    /// Pooled vector of sequence 0, embedding mode only.
    embd_seq: Option<Vec<f32>>,
}

impl RefContext {
    pub(crate) fn new(
        weights: Arc<Weights>,
        n_ctx: u32,
        n_batch: u32,
        embeddings: bool,
        pooling: PoolingType,
    ) -> Self {
        let cache = HiddenCache::new(weights.n_embd, n_ctx as usize);
        RefContext {
            weights,
            cache,
            n_ctx,
            n_batch,
            embeddings,
            pooling,
            output_ids: Vec::new(),
            n_outputs: 0,
            logits: Vec::new(),
            embd: Vec::new(),
            embd_seq: None,
        }
    }

    /// Check a batch against the cache. Returns the decode status to report
    /// when the batch cannot be evaluated.
    fn validate(&self, batch: &Batch) -> Result<(), i32> {
        let n = batch.n_tokens();
        if n == 0 || !batch.is_consistent() || n > self.n_batch as usize {
            return Err(DECODE_INVALID);
        }

        let start = batch.pos[0];
        if start < 0 || start as usize > self.cache.len {
            return Err(DECODE_INVALID);
        }

        for i in 0..n {
            if batch.seq_id[i] != [0] {
                return Err(DECODE_INVALID);
            }
            if batch.token[i] < 0 || batch.token[i] as usize >= self.weights.n_vocab {
                return Err(DECODE_INVALID);
            }
            if batch.pos[i] != start + i as i32 {
                return Err(DECODE_INVALID);
            }
        }

        if start as usize + n > self.n_ctx as usize {
            return Err(DECODE_NO_SLOT);
        }
        Ok(())
    }

    fn clear_outputs(&mut self, n_tokens: usize) {
        self.output_ids.clear();
        self.output_ids.resize(n_tokens, None);
        self.n_outputs = 0;
        self.logits.clear();
        self.embd.clear();
        self.embd_seq = None;
    }

    fn pool(&self, hidden: &[f32]) -> Option<Vec<f32>> {
        let n_embd = self.weights.n_embd;
        match self.pooling {
            PoolingType::Mean => Some(kernels::mean_rows(hidden, n_embd)),
            PoolingType::Cls => hidden.get(..n_embd).map(<[f32]>::to_vec),
            PoolingType::Last => hidden
                .len()
                .checked_sub(n_embd)
                .map(|at| hidden[at..].to_vec()),
            PoolingType::None | PoolingType::Unspecified => None,
        }
    }
}

impl NativeContext for RefContext {
    fn n_ctx(&self) -> u32 {
        self.n_ctx
    }

    fn n_batch(&self) -> u32 {
        self.n_batch
    }

    fn pooling_type(&self) -> PoolingType {
        self.pooling
    }

    fn decode(&mut self, batch: &Batch) -> i32 {
        if let Err(status) = self.validate(batch) {
            trace!(status, n_tokens = batch.n_tokens(), "rejected batch");
            return status;
        }

        let n = batch.n_tokens();
        let n_embd = self.weights.n_embd;
        self.clear_outputs(n);
        // A batch at position 0 starts a new sequence.
        if batch.pos[0] == 0 {
            self.cache.reset();
        }

        let mut batch_hidden = Vec::with_capacity(if self.embeddings { n * n_embd } else { 0 });

        for i in 0..n {
            let pos = batch.pos[i] as usize;
            let emb = self.weights.embedding(batch.token[i]);
            self.cache.update(emb, pos);

            let mut hidden = kernels::mean_rows(self.cache.get(pos + 1), n_embd);
            kernels::add_assign(&mut hidden, emb);
            kernels::rms_norm(&mut hidden);

            if self.embeddings {
                batch_hidden.extend_from_slice(&hidden);
            }

            if batch.logits[i] {
                self.output_ids[i] = Some(self.n_outputs);
                self.n_outputs += 1;
                if self.embeddings {
                    self.embd.extend_from_slice(&hidden);
                } else {
                    let row = kernels::matvec(&self.weights.token_embd, &hidden, self.weights.n_vocab);
                    self.logits.extend_from_slice(&row);
                }
            }
        }

        if self.embeddings {
            self.embd_seq = self.pool(&batch_hidden);
        }

        trace!(n_tokens = n, n_outputs = self.n_outputs, cached = self.cache.len, "decoded batch");
        0
    }

    fn synchronize(&mut self) {}

    fn logits_ith(&self, i: i32) -> Option<&[f32]> {
        if self.embeddings {
            return None;
        }
        let row = if i < 0 {
            let back = i.unsigned_abs() as usize;
            self.n_outputs.checked_sub(back)?
        } else {
            (*self.output_ids.get(i as usize)?)?
        };
        let n_vocab = self.weights.n_vocab;
        self.logits.get(row * n_vocab..(row + 1) * n_vocab)
    }

    fn embeddings(&self) -> Option<&[f32]> {
        if self.embd.is_empty() {
            None
        } else {
            Some(&self.embd)
        }
    }

    fn embeddings_seq(&self, seq: SeqId) -> Option<&[f32]> {
        if seq != 0 {
            return None;
        }
        self.embd_seq.as_deref()
    }
}

//! Scripted engine for unit tests.
//!
//! `ScriptedModel` tokenizes each byte to its own id and renders token `t` as
//! `"t{t}"`. Its contexts record every decoded batch and replay queued logits,
//! one row per successful decode.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ib_engine::{
    Backend, Batch, ContextParams, EngineError, NativeContext, NativeModel, PoolingType, SeqId,
    TokenId,
};

const BOS: TokenId = 1;
const EOS: TokenId = 2;
const FIRST_BYTE_TOKEN: TokenId = 3;

/// Logits that make `token` the only plausible choice.
pub fn one_hot(n_vocab: usize, token: TokenId) -> Vec<f32> {
    let mut logits = vec![-100.0; n_vocab];
    logits[token as usize] = 100.0;
    logits
}

#[derive(Default)]
pub struct Script {
    /// Every batch passed to `decode`, including failed ones.
    pub batches: Vec<Batch>,
    /// Logits for successive successful decodes.
    pub logits: VecDeque<Vec<f32>>,
    /// `(call index, status)`: make that decode call fail.
    pub fail_decode_at: Option<(usize, i32)>,
    pub pooled: Option<Vec<f32>>,
    pub raw: Option<Vec<f32>>,
    pub pooling: PoolingType,
    pub synchronized: usize,
}

pub type SharedScript = Arc<Mutex<Script>>;

#[derive(Clone)]
pub struct ScriptedModel {
    n_vocab: usize,
    n_embd: usize,
    unrenderable: Vec<TokenId>,
    tokenize_status: Option<i32>,
    nul_terminated: bool,
    fail_context: bool,
    script: SharedScript,
}

fn write_or_size<T: Copy>(src: &[T], out: Option<&mut [T]>) -> i32 {
    if src.is_empty() {
        return 0;
    }
    match out {
        Some(buf) if buf.len() >= src.len() => {
            buf[..src.len()].copy_from_slice(src);
            src.len() as i32
        }
        _ => -(src.len() as i32),
    }
}

impl ScriptedModel {
    pub fn new(n_vocab: usize) -> Self {
        Self {
            n_vocab,
            n_embd: 4,
            unrenderable: Vec::new(),
            tokenize_status: None,
            nul_terminated: false,
            fail_context: false,
            script: Arc::new(Mutex::new(Script {
                pooling: PoolingType::Mean,
                ..Default::default()
            })),
        }
    }

    pub fn with_embd(mut self, n_embd: usize) -> Self {
        self.n_embd = n_embd;
        self
    }

    pub fn unrenderable(mut self, tokens: &[TokenId]) -> Self {
        self.unrenderable.extend_from_slice(tokens);
        self
    }

    /// Make the fill pass of `tokenize` return `status`.
    pub fn failing_tokenize(mut self, status: i32) -> Self {
        self.tokenize_status = Some(status);
        self
    }

    /// Append a NUL byte to detokenized text.
    pub fn with_nul_terminator(mut self) -> Self {
        self.nul_terminated = true;
        self
    }

    pub fn failing_context(mut self) -> Self {
        self.fail_context = true;
        self
    }

    pub fn script(&self) -> SharedScript {
        Arc::clone(&self.script)
    }

    fn render(&self, token: TokenId, special: bool) -> Vec<u8> {
        match token {
            BOS if special => b"<s>".to_vec(),
            EOS if special => b"</s>".to_vec(),
            BOS | EOS => Vec::new(),
            t if self.unrenderable.contains(&t) => Vec::new(),
            t => format!("t{}", t).into_bytes(),
        }
    }
}

impl NativeModel for ScriptedModel {
    fn n_vocab(&self) -> usize {
        self.n_vocab
    }

    fn n_embd(&self) -> usize {
        self.n_embd
    }

    fn n_ctx_train(&self) -> u32 {
        128
    }

    fn n_params(&self) -> u64 {
        (self.n_vocab * self.n_embd) as u64
    }

    fn token_bos(&self) -> TokenId {
        BOS
    }

    fn token_eos(&self) -> TokenId {
        EOS
    }

    fn tokenize(
        &self,
        text: &str,
        out: Option<&mut [TokenId]>,
        add_special: bool,
        _parse_special: bool,
    ) -> i32 {
        let span = (self.n_vocab as TokenId - FIRST_BYTE_TOKEN).max(1);
        let mut ids: Vec<TokenId> = Vec::new();
        if add_special {
            ids.push(BOS);
        }
        ids.extend(text.bytes().map(|b| FIRST_BYTE_TOKEN + b as TokenId % span));

        match (self.tokenize_status, out) {
            (Some(status), Some(_)) => status,
            (_, out) => write_or_size(&ids, out),
        }
    }

    fn detokenize(
        &self,
        tokens: &[TokenId],
        out: Option<&mut [u8]>,
        _remove_special: bool,
        unparse_special: bool,
    ) -> i32 {
        let mut bytes: Vec<u8> = tokens
            .iter()
            .flat_map(|&t| self.render(t, unparse_special))
            .collect();
        if self.nul_terminated {
            bytes.push(0);
        }
        write_or_size(&bytes, out)
    }

    fn token_to_piece(
        &self,
        token: TokenId,
        out: Option<&mut [u8]>,
        _lstrip: usize,
        special: bool,
    ) -> i32 {
        write_or_size(&self.render(token, special), out)
    }

    fn new_context(&self, _params: &ContextParams) -> ib_engine::Result<Box<dyn NativeContext>> {
        if self.fail_context {
            return Err(EngineError::ContextAlloc("scripted failure".to_string()));
        }
        Ok(Box::new(ScriptedContext {
            script: Arc::clone(&self.script),
            current: None,
            output_ids: Vec::new(),
            n_outputs: 0,
            pooled: None,
            raw: None,
        }))
    }
}

pub struct ScriptedContext {
    script: SharedScript,
    current: Option<Vec<f32>>,
    output_ids: Vec<bool>,
    n_outputs: usize,
    pooled: Option<Vec<f32>>,
    raw: Option<Vec<f32>>,
}

impl NativeContext for ScriptedContext {
    fn n_ctx(&self) -> u32 {
        128
    }

    fn n_batch(&self) -> u32 {
        128
    }

    fn pooling_type(&self) -> PoolingType {
        self.script.lock().map(|s| s.pooling).unwrap_or_default()
    }

    fn decode(&mut self, batch: &Batch) -> i32 {
        let Ok(mut script) = self.script.lock() else {
            return -1;
        };
        let call = script.batches.len();
        script.batches.push(batch.clone());
        if let Some((at, status)) = script.fail_decode_at {
            if at == call {
                return status;
            }
        }

        self.current = script.logits.pop_front();
        self.output_ids = batch.logits.clone();
        self.n_outputs = batch.output_slots().count();
        self.pooled = script.pooled.clone();
        self.raw = script.raw.clone();
        0
    }

    fn synchronize(&mut self) {
        if let Ok(mut script) = self.script.lock() {
            script.synchronized += 1;
        }
    }

    fn logits_ith(&self, i: i32) -> Option<&[f32]> {
        let present = if i < 0 {
            i.unsigned_abs() as usize <= self.n_outputs
        } else {
            self.output_ids.get(i as usize).copied().unwrap_or(false)
        };
        if present {
            self.current.as_deref()
        } else {
            None
        }
    }

    fn embeddings(&self) -> Option<&[f32]> {
        self.raw.as_deref()
    }

    fn embeddings_seq(&self, seq: SeqId) -> Option<&[f32]> {
        if seq == 0 {
            self.pooled.as_deref()
        } else {
            None
        }
    }
}

/// Backend handing out clones of one scripted model.
pub struct ScriptedBackend {
    pub model: ScriptedModel,
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load_model(&self, path: &Path) -> ib_engine::Result<Box<dyn NativeModel>> {
        if path.as_os_str().is_empty() || path.ends_with("missing") {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such model",
            )));
        }
        Ok(Box::new(self.model.clone()))
    }
}

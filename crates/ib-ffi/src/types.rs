use ib_core::{
    ContextOptions, DetokenizeOptions, GenerateOptions, LogLevel, ModelMetadata, ModelOptions,
    TokenizeOptions,
};

/// Token id as seen by C callers; same width as the engine's id.
pub type IbTokenId = i32;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IbStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorModelLoad = 2,
    ErrorContextCreate = 3,
    ErrorNotLoaded = 4,
    ErrorReleased = 5,
    ErrorModeMismatch = 6,
    ErrorTokenize = 7,
    ErrorDecode = 8,
    ErrorInternal = 9,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IbModelOptions {
    /// 0 none, 1 error, 2 warn, 3 info, 4 debug.
    pub log_level: i32,
}

impl From<IbModelOptions> for ModelOptions {
    fn from(o: IbModelOptions) -> Self {
        ModelOptions {
            log_level: LogLevel::from_raw(o.log_level),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IbTokenizeOptions {
    pub add_special: bool,
    pub parse_special: bool,
}

impl From<IbTokenizeOptions> for TokenizeOptions {
    fn from(o: IbTokenizeOptions) -> Self {
        TokenizeOptions {
            add_special: o.add_special,
            parse_special: o.parse_special,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IbDetokenizeOptions {
    pub remove_special: bool,
    pub unparse_special: bool,
}

impl From<IbDetokenizeOptions> for DetokenizeOptions {
    fn from(o: IbDetokenizeOptions) -> Self {
        DetokenizeOptions {
            remove_special: o.remove_special,
            unparse_special: o.unparse_special,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IbContextOptions {
    pub embedding: bool,
    pub context_size: u32,
    pub batch_size: u32,
}

impl Default for IbContextOptions {
    fn default() -> Self {
        let o = ContextOptions::default();
        Self {
            embedding: o.embedding,
            context_size: o.context_size,
            batch_size: o.batch_size,
        }
    }
}

impl From<IbContextOptions> for ContextOptions {
    fn from(o: IbContextOptions) -> Self {
        ContextOptions {
            embedding: o.embedding,
            context_size: o.context_size,
            batch_size: o.batch_size,
        }
    }
}

/// Parameters controlling text generation.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IbGenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: i32,
    /// `0xFFFFFFFF` draws a seed from entropy.
    pub seed: u32,
}

impl Default for IbGenerateOptions {
    fn default() -> Self {
        let o = GenerateOptions::default();
        Self {
            max_tokens: o.max_tokens,
            temperature: o.temperature,
            top_k: o.top_k,
            seed: o.seed,
        }
    }
}

impl From<IbGenerateOptions> for GenerateOptions {
    fn from(o: IbGenerateOptions) -> Self {
        GenerateOptions {
            max_tokens: o.max_tokens,
            temperature: o.temperature,
            top_k: o.top_k,
            seed: o.seed,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IbModelMetadata {
    pub parameters: u64,
    pub context_window: u32,
    pub embedding_length: u64,
    pub vocab_size: u64,
}

impl From<ModelMetadata> for IbModelMetadata {
    fn from(m: ModelMetadata) -> Self {
        IbModelMetadata {
            parameters: m.parameters,
            context_window: m.context_window,
            embedding_length: m.embedding_length as u64,
            vocab_size: m.vocab_size as u64,
        }
    }
}

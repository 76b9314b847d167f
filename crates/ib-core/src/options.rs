//! Option structs accepted by the public API.
//!
//! Field names serialize in camelCase so host option objects (`maxTokens`,
//! `contextSize`, ...) deserialize directly; missing fields take the defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

pub const DEFAULT_CONTEXT_SIZE: u32 = 2048;
pub const DEFAULT_BATCH_SIZE: u32 = 512;
pub const DEFAULT_MAX_TOKENS: u32 = 20;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TOP_K: i32 = 40;
pub const DEFAULT_SEED: u32 = 0;

/// What a context produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Embedding,
    Generation,
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextMode::Embedding => f.write_str("embeddings"),
            ContextMode::Generation => f.write_str("generation"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelOptions {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenizeOptions {
    /// Prepend the model's beginning-of-sequence marker.
    pub add_special: bool,
    /// Map special token texts in the input to their control tokens.
    pub parse_special: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetokenizeOptions {
    /// Drop a leading BOS and a trailing EOS.
    pub remove_special: bool,
    /// Render control tokens as their text.
    pub unparse_special: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextOptions {
    /// Create an embedding context instead of a generation context.
    pub embedding: bool,
    /// Maximum sequence length.
    pub context_size: u32,
    /// Maximum number of tokens submitted in one decode.
    pub batch_size: u32,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            embedding: false,
            context_size: DEFAULT_CONTEXT_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ContextOptions {
    pub fn mode(&self) -> ContextMode {
        if self.embedding {
            ContextMode::Embedding
        } else {
            ContextMode::Generation
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateOptions {
    /// Number of tokens to generate, not counting the prompt.
    pub max_tokens: u32,
    /// Logit scale divisor; `<= 0` selects greedy decoding.
    pub temperature: f32,
    /// Candidates kept before the draw; `<= 0` keeps all.
    pub top_k: i32,
    /// Seed of the draw. `ib_sampler::DEFAULT_SEED` seeds from entropy.
    pub seed: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            seed: DEFAULT_SEED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = ContextOptions::default();
        assert_eq!(ctx.context_size, 2048);
        assert_eq!(ctx.batch_size, 512);
        assert_eq!(ctx.mode(), ContextMode::Generation);

        let gen = GenerateOptions::default();
        assert_eq!(gen.max_tokens, 20);
        assert_eq!(gen.top_k, 40);
        assert_eq!(gen.seed, 0);
        assert!((gen.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_camel_case() {
        let gen: GenerateOptions = serde_json::from_str(r#"{"maxTokens": 5, "topK": 0}"#).unwrap();
        assert_eq!(gen.max_tokens, 5);
        assert_eq!(gen.top_k, 0);
        assert_eq!(gen.seed, 0);

        let ctx: ContextOptions = serde_json::from_str(r#"{"embedding": true}"#).unwrap();
        assert_eq!(ctx.mode(), ContextMode::Embedding);
        assert_eq!(ctx.context_size, 2048);

        let tok: TokenizeOptions = serde_json::from_str(r#"{"addSpecial": true}"#).unwrap();
        assert!(tok.add_special && !tok.parse_special);

        let model: ModelOptions = serde_json::from_str(r#"{"logLevel": 3}"#).unwrap();
        assert_eq!(model.log_level, LogLevel::Info);
    }
}

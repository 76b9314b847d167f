use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::native::PoolingType;

/// Largest embedding width the reference engine accepts.
pub const MAX_EMBD: usize = 4096;

/// JSON model file understood by the reference engine.
///
/// ```json
/// {
///   "tokens": ["he", "ll", "hello"],
///   "merges": [["h", "e"], ["l", "l"], ["he", "ll"], ["hell", "o"]],
///   "nEmbd": 32,
///   "nCtxTrain": 2048,
///   "seed": 0,
///   "pooling": "mean"
/// }
/// ```
///
/// Every field is optional; an empty object describes a byte-only model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Merged tokens appended after the specials and byte tokens.
    pub tokens: Vec<String>,
    /// Ordered BPE merge rules, highest priority first.
    pub merges: Vec<(String, String)>,
    /// Embedding dimensionality.
    pub n_embd: usize,
    /// Context window the weights were "trained" with.
    pub n_ctx_train: u32,
    /// Seed for the generated weights.
    pub seed: u64,
    /// Pooling used when a context leaves it unspecified.
    pub pooling: PoolingType,
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            merges: Vec::new(),
            n_embd: 32,
            n_ctx_train: 2048,
            seed: 0,
            pooling: PoolingType::Mean,
        }
    }
}

impl ModelDescriptor {
    /// Read and validate a descriptor file.
    pub fn from_path(path: &Path) -> Result<ModelDescriptor> {
        let bytes = std::fs::read(path)?;
        let descriptor: ModelDescriptor = serde_json::from_slice(&bytes)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the descriptor as JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Check the numeric fields. Vocabulary and merges are checked when the
    /// tokenizer is built.
    pub fn validate(&self) -> Result<()> {
        if self.n_embd == 0 || self.n_embd > MAX_EMBD {
            return Err(EngineError::InvalidDescriptor(format!(
                "nEmbd must be in 1..={}, got {}",
                MAX_EMBD, self.n_embd
            )));
        }
        if self.n_ctx_train == 0 {
            return Err(EngineError::InvalidDescriptor(
                "nCtxTrain must be positive".to_string(),
            ));
        }
        if self.pooling == PoolingType::Unspecified {
            return Err(EngineError::InvalidDescriptor(
                "pooling must name a concrete mode".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_object_fills_defaults() {
        let d: ModelDescriptor = serde_json::from_str(r#"{"nEmbd": 8}"#).unwrap();
        assert_eq!(d.n_embd, 8);
        assert_eq!(d.n_ctx_train, 2048);
        assert_eq!(d.pooling, PoolingType::Mean);
        assert!(d.tokens.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let d = ModelDescriptor {
            tokens: vec!["he".to_string()],
            merges: vec![("h".to_string(), "e".to_string())],
            pooling: PoolingType::Last,
            ..Default::default()
        };
        d.save(&path).unwrap();
        assert_eq!(ModelDescriptor::from_path(&path).unwrap(), d);
    }

    #[test]
    fn test_invalid_fields() {
        let d = ModelDescriptor {
            n_embd: 0,
            ..Default::default()
        };
        assert!(matches!(d.validate(), Err(EngineError::InvalidDescriptor(_))));

        let d = ModelDescriptor {
            pooling: PoolingType::Unspecified,
            ..Default::default()
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ModelDescriptor::from_path(&path),
            Err(EngineError::Descriptor(_))
        ));
    }
}

//! One model plus its current context, with per-session token defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ib_engine::{Backend, TokenId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::logging::LogLevel;
use crate::model::{Model, ModelMetadata};
use crate::options::{
    ContextMode, ContextOptions, DetokenizeOptions, GenerateOptions, ModelOptions,
    TokenizeOptions,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    pub model_filepath: PathBuf,
    pub log_level: LogLevel,
    /// Open an embedding context instead of a generation context.
    pub embedding: bool,
    pub add_special: bool,
    pub parse_special: bool,
    pub remove_special: bool,
    pub unparse_special: bool,
    /// Size of the initial context. Its `embedding` flag is taken from the
    /// session.
    pub context: ContextOptions,
}

/// Arguments of [`Session::context`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextRequest {
    /// Keep the current context instead of creating a new one.
    pub existing: bool,
    #[serde(flatten)]
    pub options: ContextOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(flatten)]
    pub model: ModelMetadata,
    pub filepath: PathBuf,
    pub embedding: bool,
    pub context: ContextOptions,
}

pub struct Session {
    options: SessionOptions,
    model: Model,
    context: Context,
}

impl Session {
    /// Create and load the model, then open the initial context.
    pub fn open(backend: Arc<dyn Backend>, options: SessionOptions) -> Result<Session> {
        let model = Model::create(
            backend,
            ModelOptions {
                log_level: options.log_level,
            },
        );
        if let Err(err) = model.load(&options.model_filepath) {
            model.destroy();
            return Err(err);
        }

        let initial = ContextOptions {
            embedding: options.embedding,
            ..options.context
        };
        let context = match Context::create(&model, initial) {
            Ok(context) => context,
            Err(err) => {
                model.destroy();
                return Err(err);
            }
        };

        Ok(Session {
            options,
            model,
            context,
        })
    }

    pub fn filepath(&self) -> &Path {
        &self.options.model_filepath
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn metadata(&self) -> Result<SessionMetadata> {
        Ok(SessionMetadata {
            model: self.model.metadata()?,
            filepath: self.options.model_filepath.clone(),
            embedding: self.options.embedding,
            context: *self.context.options(),
        })
    }

    fn tokenize_defaults(&self) -> TokenizeOptions {
        TokenizeOptions {
            add_special: self.options.add_special,
            parse_special: self.options.parse_special,
        }
    }

    fn detokenize_defaults(&self) -> DetokenizeOptions {
        DetokenizeOptions {
            remove_special: self.options.remove_special,
            unparse_special: self.options.unparse_special,
        }
    }

    /// Tokenize with `options`, or the session defaults when `None`.
    pub fn tokenize(&self, text: &str, options: Option<TokenizeOptions>) -> Result<Vec<TokenId>> {
        let options = options.unwrap_or_else(|| self.tokenize_defaults());
        self.model.tokenize(text, options)
    }

    pub fn detokenize(&self, tokens: &[TokenId], options: Option<DetokenizeOptions>) -> Result<String> {
        let options = options.unwrap_or_else(|| self.detokenize_defaults());
        self.model.detokenize(tokens, options)
    }

    /// Return the current context, or replace it with a new one.
    ///
    /// A replaced context is finalized; it stays usable through clones taken
    /// earlier until those are dropped.
    pub fn context(&mut self, request: ContextRequest) -> Result<&Context> {
        if request.existing {
            return Ok(&self.context);
        }

        let replacement = Context::create(&self.model, request.options)?;
        let previous = std::mem::replace(&mut self.context, replacement);
        let outcome = previous.finalize();
        debug!(?outcome, "replaced session context");
        Ok(&self.context)
    }

    pub fn encode(&self, text: &str, options: Option<TokenizeOptions>) -> Result<Vec<f64>> {
        if self.context.mode() != ContextMode::Embedding {
            return Err(Error::ModeMismatch {
                expected: ContextMode::Embedding,
            });
        }
        let options = options.unwrap_or_else(|| self.tokenize_defaults());
        self.context.encode(text, options)
    }

    pub fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
        tokenize: Option<TokenizeOptions>,
    ) -> Result<String> {
        if self.context.mode() != ContextMode::Generation {
            return Err(Error::ModeMismatch {
                expected: ContextMode::Generation,
            });
        }
        let tokenize = tokenize.unwrap_or_else(|| self.tokenize_defaults());
        self.context.generate(prompt, options, tokenize)
    }

    /// Destroy the context, then the model.
    pub fn close(self) {
        self.context.destroy();
        self.model.destroy();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // No-ops after `close`.
        self.context.finalize();
        self.model.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{one_hot, ScriptedBackend, ScriptedModel};

    fn open(scripted: ScriptedModel, embedding: bool) -> Result<Session> {
        Session::open(
            Arc::new(ScriptedBackend { model: scripted }),
            SessionOptions {
                model_filepath: PathBuf::from("model.bin"),
                embedding,
                add_special: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_open_and_metadata() {
        let session = open(ScriptedModel::new(16), false).unwrap();
        let meta = session.metadata().unwrap();
        assert_eq!(meta.filepath, PathBuf::from("model.bin"));
        assert!(!meta.embedding);
        assert_eq!(meta.context.context_size, 2048);
        assert_eq!(meta.model.vocab_size, 16);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["vocabSize"], 16);
        assert_eq!(json["context"]["contextSize"], 2048);
    }

    #[test]
    fn test_open_missing_model() {
        let err = Session::open(
            Arc::new(ScriptedBackend {
                model: ScriptedModel::new(16),
            }),
            SessionOptions {
                model_filepath: PathBuf::from("missing"),
                ..Default::default()
            },
        );
        assert!(matches!(err, Err(Error::Load(_))));
    }

    #[test]
    fn test_token_defaults_and_overrides() {
        let session = open(ScriptedModel::new(16), false).unwrap();
        let with_bos = session.tokenize("ab", None).unwrap();
        let without = session
            .tokenize("ab", Some(TokenizeOptions::default()))
            .unwrap();
        assert_eq!(with_bos.len(), without.len() + 1);
        assert_eq!(session.detokenize(&without, None).unwrap(), session.detokenize(&with_bos, None).unwrap());
    }

    #[test]
    fn test_mode_checked_up_front() {
        let session = open(ScriptedModel::new(16), false).unwrap();
        assert!(matches!(
            session.encode("x", None),
            Err(Error::ModeMismatch {
                expected: ContextMode::Embedding
            })
        ));
    }

    #[test]
    fn test_replace_context() {
        let scripted = ScriptedModel::new(16).with_embd(2);
        scripted.script().lock().unwrap().pooled = Some(vec![1.0, 0.0]);
        let mut session = open(scripted, false).unwrap();
        assert_eq!(session.model().ref_count(), 2);

        let kept = session
            .context(ContextRequest {
                existing: true,
                ..Default::default()
            })
            .unwrap()
            .mode();
        assert_eq!(kept, ContextMode::Generation);

        session
            .context(ContextRequest {
                existing: false,
                options: ContextOptions {
                    embedding: true,
                    ..Default::default()
                },
            })
            .unwrap();
        // The replaced context released its model reference.
        assert_eq!(session.model().ref_count(), 2);
        assert_eq!(session.encode("x", None).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_generate_and_close() {
        let scripted = ScriptedModel::new(16);
        scripted.script().lock().unwrap().logits.push_back(one_hot(16, 7));
        let session = open(scripted, false).unwrap();
        let model = session.model().clone();

        let options = GenerateOptions {
            max_tokens: 1,
            temperature: 0.0,
            ..Default::default()
        };
        assert_eq!(session.generate("hi", options, None).unwrap(), "t7");

        session.close();
        assert_eq!(model.ref_count(), 0);
    }

    #[test]
    fn test_request_deserializes_flat() {
        let req: ContextRequest =
            serde_json::from_str(r#"{"existing": true, "contextSize": 64}"#).unwrap();
        assert!(req.existing);
        assert_eq!(req.options.context_size, 64);
        assert_eq!(req.options.batch_size, 512);
    }
}

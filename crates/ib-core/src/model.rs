use std::path::Path;
use std::sync::Arc;

use ib_engine::{Backend, NativeModel, TokenId};
use serde::Serialize;
use tracing::{debug, info};

use crate::codec;
use crate::error::{Error, Result};
use crate::handle::{Release, ResourceHandle, Retained};
use crate::logging;
use crate::options::{DetokenizeOptions, ModelOptions, TokenizeOptions};

pub(crate) type NativeModelBox = Box<dyn NativeModel>;

/// Model dimensions reported after a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub parameters: u64,
    pub context_window: u32,
    pub embedding_length: usize,
    pub vocab_size: usize,
}

/// Loaded weights and vocabulary, shared by any number of contexts.
///
/// Cloning shares the same underlying handle.
#[derive(Clone)]
pub struct Model {
    handle: ResourceHandle<NativeModelBox>,
    backend: Arc<dyn Backend>,
}

impl Model {
    /// Allocate an empty model record and apply `options.log_level`
    /// process-wide.
    ///
    /// The crate's `tracing` subscriber is installed only once some model
    /// asks for a level above [`LogLevel::None`](crate::LogLevel::None); at
    /// the default level the host remains free to install its own.
    pub fn create(backend: Arc<dyn Backend>, options: ModelOptions) -> Model {
        logging::set_log_level(options.log_level);
        debug!(backend = backend.name(), "created model record");
        Model {
            handle: ResourceHandle::new("model"),
            backend,
        }
    }

    /// Load weights from `path`. A model can be loaded once.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.handle.ref_count() == 0 {
            return Err(Error::Released);
        }
        if self.handle.is_populated() {
            return Err(Error::AlreadyLoaded);
        }

        let native = self.backend.load_model(path).map_err(Error::Load)?;
        let meta = (native.n_params(), native.n_embd(), native.n_vocab());
        self.handle.populate(native)?;

        info!(
            path = %path.display(),
            parameters = meta.0,
            n_embd = meta.1,
            n_vocab = meta.2,
            "model loaded"
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_populated()
    }

    pub fn destroy(&self) -> Release {
        self.handle.destroy()
    }

    pub fn finalize(&self) -> Release {
        self.handle.finalize()
    }

    /// Current owner count (host wrapper plus live contexts).
    pub fn ref_count(&self) -> usize {
        self.handle.ref_count()
    }

    pub fn metadata(&self) -> Result<ModelMetadata> {
        self.handle.with(|m| ModelMetadata {
            parameters: m.n_params(),
            context_window: m.n_ctx_train(),
            embedding_length: m.n_embd(),
            vocab_size: m.n_vocab(),
        })
    }

    pub fn tokenize(&self, text: &str, options: TokenizeOptions) -> Result<Vec<TokenId>> {
        self.handle.with(|m| codec::tokenize(m.as_ref(), text, options))?
    }

    /// See [`codec::detokenize`] for how a trailing NUL is handled.
    pub fn detokenize(&self, tokens: &[TokenId], options: DetokenizeOptions) -> Result<String> {
        self.handle.with(|m| codec::detokenize(m.as_ref(), tokens, options))?
    }

    pub(crate) fn retain(&self) -> Result<Retained<NativeModelBox>> {
        self.handle.retain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, ScriptedModel};

    fn model() -> Model {
        let backend = Arc::new(ScriptedBackend {
            model: ScriptedModel::new(32),
        });
        Model::create(backend, ModelOptions::default())
    }

    #[test]
    fn test_not_loaded() {
        let model = model();
        assert!(!model.is_loaded());
        assert!(matches!(model.metadata(), Err(Error::NotLoaded)));
        assert!(matches!(
            model.tokenize("a", TokenizeOptions::default()),
            Err(Error::NotLoaded)
        ));
    }

    #[test]
    fn test_load_once() {
        let model = model();
        model.load("model.bin").unwrap();
        assert!(matches!(model.load("model.bin"), Err(Error::AlreadyLoaded)));

        let meta = model.metadata().unwrap();
        assert_eq!(meta.vocab_size, 32);
        assert_eq!(meta.context_window, 128);
        assert_eq!(meta.parameters, 32 * 4);
    }

    #[test]
    fn test_load_failure_leaves_unloaded() {
        let model = model();
        assert!(matches!(model.load("missing"), Err(Error::Load(_))));
        assert!(!model.is_loaded());
        assert_eq!(model.ref_count(), 1);
        model.load("model.bin").unwrap();
    }

    #[test]
    fn test_tokenize_round_trip() {
        let model = model();
        model.load("model.bin").unwrap();
        let plain = model.tokenize("ab", TokenizeOptions::default()).unwrap();
        let special = model
            .tokenize(
                "ab",
                TokenizeOptions {
                    add_special: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(special.len(), plain.len() + 1);

        let text = model
            .detokenize(
                &special,
                DetokenizeOptions {
                    unparse_special: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(text.starts_with("<s>"));
    }

    #[test]
    fn test_destroy_releases() {
        let model = model();
        model.load("model.bin").unwrap();
        assert_eq!(model.destroy(), Release::Freed);
        assert_eq!(model.finalize(), Release::Ignored);
        assert!(matches!(model.metadata(), Err(Error::Released)));
        assert!(matches!(model.load("model.bin"), Err(Error::Released)));
    }
}

use ib_engine::{ContextParams, NativeContext, PoolingType};
use tracing::info;

use crate::embed;
use crate::error::{Error, Result};
use crate::generate::{self, Completion};
use crate::handle::{Release, ResourceHandle, Retained};
use crate::model::{Model, NativeModelBox};
use crate::options::{ContextMode, ContextOptions, GenerateOptions, TokenizeOptions};

pub(crate) struct ContextState {
    // Dropped before `model`, so the model outlives its evaluation state.
    native: Box<dyn NativeContext>,
    model: Retained<NativeModelBox>,
}

/// Evaluation state bound to one model, fixed to embedding or generation at
/// creation.
///
/// Calls against the same context are serialized; cloning shares the same
/// underlying handle.
#[derive(Clone)]
pub struct Context {
    handle: ResourceHandle<ContextState>,
    options: ContextOptions,
}

impl Context {
    /// Allocate a context for `model`. The context holds a reference to the
    /// model until it is released.
    pub fn create(model: &Model, options: ContextOptions) -> Result<Context> {
        let retained = model.retain()?;
        let params = ContextParams {
            n_ctx: options.context_size,
            n_batch: options.batch_size,
            embeddings: options.embedding,
            pooling: PoolingType::Unspecified,
        };
        let native = retained.with(|m| m.new_context(&params))?.map_err(Error::Create)?;

        let handle = ResourceHandle::new("context");
        handle.populate(ContextState {
            native,
            model: retained,
        })?;

        info!(
            mode = %options.mode(),
            context_size = options.context_size,
            batch_size = options.batch_size,
            "context created"
        );
        Ok(Context { handle, options })
    }

    pub fn mode(&self) -> ContextMode {
        self.options.mode()
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn destroy(&self) -> Release {
        self.handle.destroy()
    }

    pub fn finalize(&self) -> Release {
        self.handle.finalize()
    }

    pub fn is_released(&self) -> bool {
        self.handle.ref_count() == 0
    }

    fn expect_mode(&self, expected: ContextMode) -> Result<()> {
        if self.mode() == expected {
            Ok(())
        } else {
            Err(Error::ModeMismatch { expected })
        }
    }

    /// Embed `text`. Requires an embedding context.
    pub fn encode(&self, text: &str, options: TokenizeOptions) -> Result<Vec<f64>> {
        self.expect_mode(ContextMode::Embedding)?;
        self.handle.with_mut(|state| {
            let ContextState { native, model } = state;
            model.with(|m| embed::run(m.as_ref(), native.as_mut(), text, options))?
        })?
    }

    /// Generate text following `prompt`. Requires a generation context.
    pub fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
        tokenize: TokenizeOptions,
    ) -> Result<String> {
        self.complete(prompt, options, tokenize).map(|c| c.text)
    }

    /// Like [`Context::generate`], also reporting the generated ids and why
    /// generation stopped.
    pub fn complete(
        &self,
        prompt: &str,
        options: GenerateOptions,
        tokenize: TokenizeOptions,
    ) -> Result<Completion> {
        self.expect_mode(ContextMode::Generation)?;
        self.handle.with_mut(|state| {
            let ContextState { native, model } = state;
            model.with(|m| generate::run(m.as_ref(), native.as_mut(), prompt, options, tokenize))?
        })?
    }
}

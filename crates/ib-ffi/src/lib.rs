//! C ABI over `ib-core`.
//!
//! Models and contexts are opaque heap handles. `*_destroy` releases the
//! native resource and may be called any number of times; `*_finalize`
//! releases it if still held and frees the handle itself, after which the
//! pointer must not be used. A context keeps its model's native resource
//! alive until the context is released.
//!
//! Every function returns an [`IbStatus`]; on failure the message is kept per
//! thread and returned by [`ib_last_error`]. A null options pointer selects
//! the defaults.
//!
//! Text travels as UTF-8 bytes with an explicit length in both directions, so
//! it may contain NUL bytes. Returned text is not NUL-terminated and is freed
//! with `ib_free_text`. Only model paths and error messages are C strings.

mod error;
mod types;

pub use error::*;
pub use types::*;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, OnceLock};

use ib_core::{Context, Model, TokenizeOptions};
use ib_engine::{Backend, RefBackend};

/// Opaque model handle.
pub struct IbModel {
    inner: Model,
}

/// Opaque context handle.
pub struct IbContext {
    inner: Context,
}

type FfiResult = Result<(), IbStatus>;

static BACKEND: OnceLock<Arc<dyn Backend>> = OnceLock::new();

fn backend() -> Arc<dyn Backend> {
    Arc::clone(BACKEND.get_or_init(|| Arc::new(RefBackend::new())))
}

/// Run `f`, converting panics into `IbStatus::ErrorInternal`.
fn guarded<F: FnOnce() -> FfiResult>(f: F) -> IbStatus {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => IbStatus::Ok,
        Ok(Err(status)) => status,
        Err(_) => {
            set_last_error("internal panic");
            IbStatus::ErrorInternal
        }
    }
}

unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, IbStatus> {
    if ptr.is_null() {
        return Err(invalid(&format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| invalid(&format!("{} is not valid UTF-8: {}", what, e)))
}

/// UTF-8 text given as a pointer and byte length. Null is accepted for
/// length 0.
unsafe fn read_text<'a>(ptr: *const u8, len: usize, what: &str) -> Result<&'a str, IbStatus> {
    if len == 0 {
        return Ok("");
    }
    if ptr.is_null() {
        return Err(invalid(&format!("{} is null", what)));
    }
    std::str::from_utf8(std::slice::from_raw_parts(ptr, len))
        .map_err(|e| invalid(&format!("{} is not valid UTF-8: {}", what, e)))
}

unsafe fn options_or_default<T: Copy + Default>(ptr: *const T) -> T {
    ptr.as_ref().copied().unwrap_or_default()
}

unsafe fn handle<'a, T>(ptr: *const T, what: &str) -> Result<&'a T, IbStatus> {
    ptr.as_ref().ok_or_else(|| invalid(&format!("{} is null", what)))
}

unsafe fn write_out<T>(out: *mut T, value: T, what: &str) -> FfiResult {
    if out.is_null() {
        return Err(invalid(&format!("{} is null", what)));
    }
    out.write(value);
    Ok(())
}

/// Hand a vector to C as a pointer and length, freed by the matching
/// `ib_free_*` function.
fn into_raw_parts<T>(values: Vec<T>) -> (*mut T, usize) {
    let len = values.len();
    if len == 0 {
        return (ptr::null_mut(), 0);
    }
    let boxed = values.into_boxed_slice();
    (Box::into_raw(boxed) as *mut T, len)
}

unsafe fn free_raw_parts<T>(ptr: *mut T, len: usize) {
    if !ptr.is_null() && len > 0 {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)));
    }
}

/// Write `text` as bytes plus length. The caller has checked both pointers.
unsafe fn write_text(text: String, text_out: *mut *mut u8, len_out: *mut usize) {
    let (ptr, len) = into_raw_parts(text.into_bytes());
    text_out.write(ptr);
    len_out.write(len);
}

/// Create an unloaded model and apply its log level process-wide.
///
/// On success, writes the handle into `*model_out`. The caller must later
/// call `ib_model_finalize`.
#[no_mangle]
pub unsafe extern "C" fn ib_model_create(
    options: *const IbModelOptions,
    model_out: *mut *mut IbModel,
) -> IbStatus {
    guarded(|| {
        if model_out.is_null() {
            return Err(invalid("model_out is null"));
        }
        let options = options_or_default(options);
        let model = Model::create(backend(), options.into());
        model_out.write(Box::into_raw(Box::new(IbModel { inner: model })));
        Ok(())
    })
}

/// Load weights from `path` into a created model. A model loads once.
#[no_mangle]
pub unsafe extern "C" fn ib_model_load(model: *const IbModel, path: *const c_char) -> IbStatus {
    guarded(|| {
        let model = handle(model, "model")?;
        let path = read_str(path, "path")?;
        model.inner.load(path).map_err(report)
    })
}

/// Release the model's native resource. Later calls are no-ops.
#[no_mangle]
pub unsafe extern "C" fn ib_model_destroy(model: *const IbModel) -> IbStatus {
    guarded(|| {
        let model = handle(model, "model")?;
        model.inner.destroy();
        Ok(())
    })
}

/// Release the model if still held and free the handle. Null is a no-op.
#[no_mangle]
pub unsafe extern "C" fn ib_model_finalize(model: *mut IbModel) -> IbStatus {
    if model.is_null() {
        return IbStatus::Ok;
    }
    guarded(|| {
        let model = Box::from_raw(model);
        model.inner.finalize();
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn ib_model_metadata(
    model: *const IbModel,
    metadata_out: *mut IbModelMetadata,
) -> IbStatus {
    guarded(|| {
        let model = handle(model, "model")?;
        let metadata = model.inner.metadata().map_err(report)?;
        write_out(metadata_out, metadata.into(), "metadata_out")
    })
}

/// Tokenize `text_len` bytes of `text`. The ids are written to
/// `*tokens_out` and their count to `*len_out`; free them with
/// `ib_free_tokens`. Empty output is a null pointer with length 0.
#[no_mangle]
pub unsafe extern "C" fn ib_tokenize(
    model: *const IbModel,
    text: *const u8,
    text_len: usize,
    options: *const IbTokenizeOptions,
    tokens_out: *mut *mut IbTokenId,
    len_out: *mut usize,
) -> IbStatus {
    guarded(|| {
        let model = handle(model, "model")?;
        let text = read_text(text, text_len, "text")?;
        if tokens_out.is_null() || len_out.is_null() {
            return Err(invalid("output pointer is null"));
        }
        let options = options_or_default(options);
        let tokens = model.inner.tokenize(text, options.into()).map_err(report)?;
        let (ptr, len) = into_raw_parts(tokens);
        tokens_out.write(ptr);
        len_out.write(len);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn ib_free_tokens(tokens: *mut IbTokenId, len: usize) {
    free_raw_parts(tokens, len);
}

/// Render `len` ids as text. The bytes are written to `*text_out` and their
/// count to `*text_len_out`; free them with `ib_free_text`.
#[no_mangle]
pub unsafe extern "C" fn ib_detokenize(
    model: *const IbModel,
    tokens: *const IbTokenId,
    len: usize,
    options: *const IbDetokenizeOptions,
    text_out: *mut *mut u8,
    text_len_out: *mut usize,
) -> IbStatus {
    guarded(|| {
        let model = handle(model, "model")?;
        if tokens.is_null() && len > 0 {
            return Err(invalid("tokens is null"));
        }
        if text_out.is_null() || text_len_out.is_null() {
            return Err(invalid("output pointer is null"));
        }
        let tokens: &[IbTokenId] = if len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(tokens, len)
        };
        let options = options_or_default(options);
        let text = model.inner.detokenize(tokens, options.into()).map_err(report)?;
        write_text(text, text_out, text_len_out);
        Ok(())
    })
}

/// Create a context for a loaded model. The caller must later call
/// `ib_context_finalize`.
#[no_mangle]
pub unsafe extern "C" fn ib_context_create(
    model: *const IbModel,
    options: *const IbContextOptions,
    context_out: *mut *mut IbContext,
) -> IbStatus {
    guarded(|| {
        let model = handle(model, "model")?;
        if context_out.is_null() {
            return Err(invalid("context_out is null"));
        }
        let options = options_or_default(options);
        let context = Context::create(&model.inner, options.into()).map_err(report)?;
        context_out.write(Box::into_raw(Box::new(IbContext { inner: context })));
        Ok(())
    })
}

/// Release the context's native resource and its model reference. Later
/// calls are no-ops.
#[no_mangle]
pub unsafe extern "C" fn ib_context_destroy(context: *const IbContext) -> IbStatus {
    guarded(|| {
        let context = handle(context, "context")?;
        context.inner.destroy();
        Ok(())
    })
}

/// Release the context if still held and free the handle. Null is a no-op.
#[no_mangle]
pub unsafe extern "C" fn ib_context_finalize(context: *mut IbContext) -> IbStatus {
    if context.is_null() {
        return IbStatus::Ok;
    }
    guarded(|| {
        let context = Box::from_raw(context);
        context.inner.finalize();
        Ok(())
    })
}

/// Embed `text_len` bytes of `text` with an embedding context. The vector
/// is written to `*values_out` with its length in `*len_out`; free it with
/// `ib_free_embedding`.
#[no_mangle]
pub unsafe extern "C" fn ib_encode(
    context: *const IbContext,
    text: *const u8,
    text_len: usize,
    options: *const IbTokenizeOptions,
    values_out: *mut *mut f64,
    len_out: *mut usize,
) -> IbStatus {
    guarded(|| {
        let context = handle(context, "context")?;
        let text = read_text(text, text_len, "text")?;
        if values_out.is_null() || len_out.is_null() {
            return Err(invalid("output pointer is null"));
        }
        let options: TokenizeOptions = options_or_default(options).into();
        let values = context.inner.encode(text, options).map_err(report)?;
        let (ptr, len) = into_raw_parts(values);
        values_out.write(ptr);
        len_out.write(len);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn ib_free_embedding(values: *mut f64, len: usize) {
    free_raw_parts(values, len);
}

/// Generate text following `prompt_len` bytes of `prompt` with a generation
/// context. The bytes are written to `*text_out` and their count to
/// `*text_len_out`; free them with `ib_free_text`.
#[no_mangle]
pub unsafe extern "C" fn ib_generate(
    context: *const IbContext,
    prompt: *const u8,
    prompt_len: usize,
    options: *const IbGenerateOptions,
    tokenize: *const IbTokenizeOptions,
    text_out: *mut *mut u8,
    text_len_out: *mut usize,
) -> IbStatus {
    guarded(|| {
        let context = handle(context, "context")?;
        let prompt = read_text(prompt, prompt_len, "prompt")?;
        if text_out.is_null() || text_len_out.is_null() {
            return Err(invalid("output pointer is null"));
        }
        let options = options_or_default(options);
        let tokenize = options_or_default(tokenize);
        let text = context
            .inner
            .generate(prompt, options.into(), tokenize.into())
            .map_err(report)?;
        write_text(text, text_out, text_len_out);
        Ok(())
    })
}

/// Retrieve the last error message of the calling thread.
///
/// Returns null if no error has been recorded since the last call. The
/// caller must free the returned string with `ib_free_string`.
#[no_mangle]
pub extern "C" fn ib_last_error() -> *mut c_char {
    match take_last_error() {
        Some(e) => e.into_raw(),
        None => ptr::null_mut(),
    }
}

/// Free a string returned by `ib_last_error`.
#[no_mangle]
pub unsafe extern "C" fn ib_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free text returned by `ib_detokenize` or `ib_generate`.
#[no_mangle]
pub unsafe extern "C" fn ib_free_text(text: *mut u8, len: usize) {
    free_raw_parts(text, len);
}

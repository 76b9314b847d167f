use std::cell::RefCell;
use std::ffi::CString;

use ib_core::Error;
use tracing::debug;

use crate::types::IbStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `ib_last_error`.
pub fn set_last_error(msg: impl Into<String>) {
    let msg = msg.into();
    LAST_ERROR.with(|e| {
        // Interior NULs cannot cross the boundary; keep the text before them.
        let msg = match CString::new(msg) {
            Ok(c) => c,
            Err(err) => {
                let end = err.nul_position();
                let mut bytes = err.into_vec();
                bytes.truncate(end);
                CString::new(bytes).unwrap_or_default()
            }
        };
        *e.borrow_mut() = Some(msg);
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

impl From<&Error> for IbStatus {
    fn from(err: &Error) -> Self {
        match err {
            Error::NotLoaded => IbStatus::ErrorNotLoaded,
            Error::Released => IbStatus::ErrorReleased,
            Error::Load(_) | Error::AlreadyLoaded => IbStatus::ErrorModelLoad,
            Error::Create(_) => IbStatus::ErrorContextCreate,
            Error::ModeMismatch { .. } => IbStatus::ErrorModeMismatch,
            Error::Tokenize { .. } | Error::Detokenize { .. } | Error::EmptyInput => {
                IbStatus::ErrorTokenize
            }
            Error::Decode { .. } | Error::LogitsUnavailable | Error::EmbeddingUnavailable => {
                IbStatus::ErrorDecode
            }
        }
    }
}

/// Record `err` and return its status.
pub fn report(err: Error) -> IbStatus {
    debug!(error = %err, "call failed at the C boundary");
    let status = IbStatus::from(&err);
    set_last_error(err.to_string());
    status
}

/// Record an argument error.
pub fn invalid(msg: &str) -> IbStatus {
    set_last_error(msg);
    IbStatus::ErrorInvalidArgument
}

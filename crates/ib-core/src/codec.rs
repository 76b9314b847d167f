//! Text and token conversion over the engine's size-then-fill calls.

use ib_engine::{NativeModel, TokenId};

use crate::error::{Error, Result};
use crate::options::{DetokenizeOptions, TokenizeOptions};

/// Run a size-then-fill engine call.
///
/// `call(None)` queries the required length (reported negated); the buffer is
/// then allocated, filled and trimmed to the count actually written. A
/// negative result from the fill pass is returned as `Err(status)`.
pub(crate) fn size_then_fill<T, F>(mut call: F) -> std::result::Result<Vec<T>, i32>
where
    T: Copy + Default,
    F: FnMut(Option<&mut [T]>) -> i32,
{
    let needed = call(None);
    if needed == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![T::default(); needed.unsigned_abs() as usize];
    let written = call(Some(buf.as_mut_slice()));
    if written < 0 {
        return Err(written);
    }
    buf.truncate(written as usize);
    Ok(buf)
}

pub fn tokenize(model: &dyn NativeModel, text: &str, options: TokenizeOptions) -> Result<Vec<TokenId>> {
    size_then_fill(|out| model.tokenize(text, out, options.add_special, options.parse_special))
        .map_err(|status| Error::Tokenize { status })
}

/// Convert tokens back to text. A trailing NUL written by the engine is
/// dropped; invalid UTF-8 is replaced rather than rejected.
///
/// The trim cannot tell a terminator from content: text whose last byte is a
/// real `\0` loses it, so `"a\0"` comes back as `"a"`. NUL bytes elsewhere
/// are kept.
pub fn detokenize(model: &dyn NativeModel, tokens: &[TokenId], options: DetokenizeOptions) -> Result<String> {
    let mut bytes = size_then_fill(|out| {
        model.detokenize(tokens, out, options.remove_special, options.unparse_special)
    })
    .map_err(|status| Error::Detokenize { status })?;

    if bytes.last() == Some(&0) {
        bytes.pop();
    }
    Ok(into_text(bytes))
}

/// Display bytes of one token, or `None` when it has no display form.
pub fn piece(model: &dyn NativeModel, token: TokenId, special: bool) -> Option<Vec<u8>> {
    size_then_fill(|out| model.token_to_piece(token, out, 0, special))
        .ok()
        .filter(|bytes| !bytes.is_empty())
}

pub(crate) fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn test_size_then_fill_sizes_and_trims() {
        let mut calls = Vec::new();
        let out = size_then_fill(|buf: Option<&mut [u8]>| {
            calls.push(buf.as_ref().map(|b| b.len()));
            match buf {
                None => -4,
                Some(b) => {
                    b[..2].copy_from_slice(b"ok");
                    2
                }
            }
        })
        .unwrap();
        assert_eq!(out, b"ok");
        assert_eq!(calls, vec![None, Some(4)]);
    }

    #[test]
    fn test_size_then_fill_errors() {
        assert_eq!(size_then_fill::<u8, _>(|_| 0), Ok(Vec::new()));
        assert_eq!(
            size_then_fill::<u8, _>(|buf| if buf.is_none() { -3 } else { -7 }),
            Err(-7)
        );
    }

    #[test]
    fn test_tokenize_status() {
        let model = ScriptedModel::new(8).failing_tokenize(-2);
        assert!(matches!(
            tokenize(&model, "abc", TokenizeOptions::default()),
            Err(Error::Tokenize { status: -2 })
        ));
    }

    #[test]
    fn test_detokenize_trims_nul() {
        let model = ScriptedModel::new(8).with_nul_terminator();
        let text = detokenize(&model, &[3, 4], DetokenizeOptions::default()).unwrap();
        assert_eq!(text, "t3t4");
    }

    #[test]
    fn test_piece_none_when_unrenderable() {
        let model = ScriptedModel::new(8).unrenderable(&[5]);
        assert_eq!(piece(&model, 4, true), Some(b"t4".to_vec()));
        assert_eq!(piece(&model, 5, true), None);
    }

    #[test]
    fn test_into_text_lossy() {
        assert_eq!(into_text(vec![b'a', 0xFF]), "a\u{FFFD}");
    }
}

use std::collections::HashMap;

use crate::batch::TokenId;
use crate::error::{EngineError, Result};

pub const UNK_TEXT: &str = "<unk>";
pub const BOS_TEXT: &str = "<s>";
pub const EOS_TEXT: &str = "</s>";

/// Symbol standing in for the space byte inside token strings.
pub const SPACE_SYMBOL: char = '\u{2581}';

/// First id of the 256 byte tokens.
pub const BYTE_BASE: TokenId = 3;

/// Role of a vocabulary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAttr {
    Unknown,
    Control,
    Byte,
    Normal,
}

/// Token vocabulary: specials, one token per byte, then merged tokens.
///
/// Layout:
/// - `0` `<unk>`, `1` `<s>` (BOS), `2` `</s>` (EOS)
/// - `3..259` byte tokens; printable ASCII is stored as the character itself,
///   the space byte as `▁`, everything else as `<0xHH>`
/// - `259..` merged tokens supplied by the model descriptor
pub struct Vocab {
    /// Token strings, indexed by token ID.
    pub tokens: Vec<String>,
    /// Token roles, indexed by token ID.
    pub attrs: Vec<TokenAttr>,
    /// Reverse mapping from token string to token ID.
    pub token_to_id: HashMap<String, TokenId>,
    pub unk_id: TokenId,
    pub bos_id: TokenId,
    pub eos_id: TokenId,
}

impl Vocab {
    /// Build the vocabulary, appending `merged` after the byte tokens.
    ///
    /// Merged entries must be non-empty and must not collide with an existing
    /// token string.
    pub fn new(merged: &[String]) -> Result<Vocab> {
        let mut tokens = Vec::with_capacity(BYTE_BASE as usize + 256 + merged.len());
        let mut attrs = Vec::with_capacity(tokens.capacity());

        for (text, attr) in [
            (UNK_TEXT, TokenAttr::Unknown),
            (BOS_TEXT, TokenAttr::Control),
            (EOS_TEXT, TokenAttr::Control),
        ] {
            tokens.push(text.to_string());
            attrs.push(attr);
        }

        for byte in 0..=u8::MAX {
            tokens.push(byte_symbol(byte));
            attrs.push(TokenAttr::Byte);
        }

        let mut token_to_id = HashMap::with_capacity(tokens.len() + merged.len());
        for (id, tok) in tokens.iter().enumerate() {
            token_to_id.insert(tok.clone(), id as TokenId);
        }

        for tok in merged {
            if tok.is_empty() {
                return Err(EngineError::Tokenizer("empty token in vocabulary".to_string()));
            }
            if token_to_id.contains_key(tok) {
                return Err(EngineError::Tokenizer(format!("duplicate token {:?}", tok)));
            }
            token_to_id.insert(tok.clone(), tokens.len() as TokenId);
            tokens.push(tok.clone());
            attrs.push(TokenAttr::Normal);
        }

        Ok(Vocab {
            tokens,
            attrs,
            token_to_id,
            unk_id: 0,
            bos_id: 1,
            eos_id: 2,
        })
    }

    /// Token id of a raw byte.
    pub fn byte_token(&self, byte: u8) -> TokenId {
        BYTE_BASE + byte as TokenId
    }

    pub fn attr(&self, id: TokenId) -> Option<TokenAttr> {
        usize::try_from(id).ok().and_then(|i| self.attrs.get(i)).copied()
    }

    pub fn text(&self, id: TokenId) -> Option<&str> {
        usize::try_from(id).ok().and_then(|i| self.tokens.get(i)).map(String::as_str)
    }

    /// Special tokens recognized in text when special parsing is enabled.
    pub fn specials(&self) -> [(TokenId, &'static str); 3] {
        [
            (self.unk_id, UNK_TEXT),
            (self.bos_id, BOS_TEXT),
            (self.eos_id, EOS_TEXT),
        ]
    }

    /// Number of tokens in the vocabulary.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Token string for a single byte.
pub fn byte_symbol(byte: u8) -> String {
    match byte {
        b' ' => SPACE_SYMBOL.to_string(),
        0x21..=0x7E => (byte as char).to_string(),
        _ => format!("<0x{:02X}>", byte),
    }
}

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::batch::TokenId;
use crate::error::{EngineError, Result};
use super::vocab::{byte_symbol, TokenAttr, Vocab, BYTE_BASE, SPACE_SYMBOL};

/// Byte-level Byte-Pair Encoding tokenizer.
pub struct BpeTokenizer {
    /// The token vocabulary (strings, roles, special token IDs).
    pub vocab: Vocab,
    /// Map from merge pair to priority rank (lower rank = higher priority).
    merge_ranks: HashMap<(String, String), usize>,
}

impl BpeTokenizer {
    /// Build a tokenizer from a vocabulary and ordered merge rules.
    ///
    /// Every merge must produce a string that exists in the vocabulary, so
    /// encoding never yields an unknown token.
    pub fn new(vocab: Vocab, merges: &[(String, String)]) -> Result<BpeTokenizer> {
        let mut merge_ranks = HashMap::with_capacity(merges.len());

        for (rank, (left, right)) in merges.iter().enumerate() {
            let merged = format!("{}{}", left, right);
            if !vocab.token_to_id.contains_key(&merged) {
                return Err(EngineError::Tokenizer(format!(
                    "merge {:?} + {:?} produces unknown token {:?}",
                    left, right, merged
                )));
            }
            merge_ranks.entry((left.clone(), right.clone())).or_insert(rank);
        }

        Ok(BpeTokenizer { vocab, merge_ranks })
    }

    /// Encode text into token IDs.
    ///
    /// With `parse_special`, occurrences of special token texts (`<s>`, `</s>`,
    /// `<unk>`) become their control tokens; otherwise they are plain text.
    pub fn encode(&self, text: &str, parse_special: bool) -> Vec<TokenId> {
        let mut out = Vec::new();

        if !parse_special {
            self.encode_segment(text, &mut out);
            return out;
        }

        let mut rest = text;
        while !rest.is_empty() {
            // Earliest match wins; the longest text breaks ties.
            let next = self
                .vocab
                .specials()
                .into_iter()
                .filter_map(|(id, special)| rest.find(special).map(|at| (at, special.len(), id)))
                .min_by_key(|&(at, len, _)| (at, Reverse(len)));

            match next {
                Some((at, len, id)) => {
                    self.encode_segment(&rest[..at], &mut out);
                    out.push(id);
                    rest = &rest[at + len..];
                }
                None => {
                    self.encode_segment(rest, &mut out);
                    break;
                }
            }
        }

        out
    }

    /// BPE over one run of plain text.
    ///
    /// Starts from one symbol per byte and repeatedly applies the
    /// highest-priority adjacent merge until none applies.
    fn encode_segment(&self, text: &str, out: &mut Vec<TokenId>) {
        if text.is_empty() {
            return;
        }

        let mut symbols: Vec<String> = text.bytes().map(byte_symbol).collect();

        while symbols.len() >= 2 {
            let mut best_rank = usize::MAX;
            let mut best_idx = usize::MAX;

            for i in 0..symbols.len() - 1 {
                let pair = (symbols[i].clone(), symbols[i + 1].clone());
                if let Some(&rank) = self.merge_ranks.get(&pair) {
                    if rank < best_rank {
                        best_rank = rank;
                        best_idx = i;
                    }
                }
            }

            if best_idx == usize::MAX {
                break;
            }

            let right = symbols.remove(best_idx + 1);
            symbols[best_idx].push_str(&right);
        }

        out.extend(symbols.iter().map(|sym| {
            self.vocab
                .token_to_id
                .get(sym)
                .copied()
                .unwrap_or(self.vocab.unk_id)
        }));
    }

    /// Display bytes of a single token. Empty when the token has no display
    /// form: the unknown token, out-of-range ids, and control tokens unless
    /// `special` is set.
    pub fn piece(&self, id: TokenId, special: bool) -> Vec<u8> {
        let (Some(attr), Some(text)) = (self.vocab.attr(id), self.vocab.text(id)) else {
            return Vec::new();
        };

        match attr {
            TokenAttr::Unknown => Vec::new(),
            TokenAttr::Control if special => text.as_bytes().to_vec(),
            TokenAttr::Control => Vec::new(),
            TokenAttr::Byte => vec![(id - BYTE_BASE) as u8],
            TokenAttr::Normal => text.replace(SPACE_SYMBOL, " ").into_bytes(),
        }
    }

    /// Concatenate the pieces of `tokens`.
    pub fn decode(&self, tokens: &[TokenId], remove_special: bool, unparse_special: bool) -> Vec<u8> {
        let mut tokens = tokens;
        if remove_special {
            if tokens.first() == Some(&self.vocab.bos_id) {
                tokens = &tokens[1..];
            }
            if tokens.last() == Some(&self.vocab.eos_id) {
                tokens = &tokens[..tokens.len() - 1];
            }
        }

        let mut bytes = Vec::new();
        for &id in tokens {
            bytes.extend(self.piece(id, unparse_special));
        }
        bytes
    }

    /// Returns the beginning-of-sequence token ID.
    pub fn bos_id(&self) -> TokenId {
        self.vocab.bos_id
    }

    /// Returns the end-of-sequence token ID.
    pub fn eos_id(&self) -> TokenId {
        self.vocab.eos_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> BpeTokenizer {
        let tokens: Vec<String> = ["he", "ll", "hell", "hello", "\u{2581}w", "or", "\u{2581}wor", "\u{2581}world"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let merges: Vec<(String, String)> = [
            ("h", "e"),
            ("l", "l"),
            ("he", "ll"),
            ("hell", "o"),
            ("\u{2581}", "w"),
            ("o", "r"),
            ("\u{2581}w", "or"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        BpeTokenizer::new(Vocab::new(&tokens).unwrap(), &merges).unwrap()
    }

    #[test]
    fn test_merge_must_exist() {
        let merges = vec![("x".to_string(), "y".to_string())];
        assert!(BpeTokenizer::new(Vocab::new(&[]).unwrap(), &merges).is_err());
    }

    #[test]
    fn test_encode_merges() {
        let tok = tokenizer();
        let ids = tok.encode("hello world", false);
        let texts: Vec<&str> = ids.iter().map(|&id| tok.vocab.text(id).unwrap()).collect();
        assert_eq!(texts, vec!["hello", "\u{2581}wor", "l", "d"]);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let tok = tokenizer();
        for text in ["hello world", "caf\u{e9} \u{1F600}", "  spaced  ", "<s> literal"] {
            let ids = tok.encode(text, false);
            assert_eq!(tok.decode(&ids, false, false), text.as_bytes());
        }
    }

    #[test]
    fn test_parse_special() {
        let tok = tokenizer();
        let ids = tok.encode("<s>he</s>", true);
        assert_eq!(ids.first(), Some(&tok.bos_id()));
        assert_eq!(ids.last(), Some(&tok.eos_id()));
        assert_eq!(ids.len(), 3);

        let plain = tok.encode("<s>he</s>", false);
        assert!(!plain.contains(&tok.bos_id()));
    }

    #[test]
    fn test_pieces() {
        let tok = tokenizer();
        assert!(tok.piece(tok.vocab.unk_id, true).is_empty());
        assert!(tok.piece(tok.eos_id(), false).is_empty());
        assert_eq!(tok.piece(tok.eos_id(), true), b"</s>");
        assert_eq!(tok.piece(tok.vocab.token_to_id["\u{2581}world"], false), b" world");
        assert!(tok.piece(99_999, true).is_empty());
    }

    #[test]
    fn test_remove_special() {
        let tok = tokenizer();
        let mut ids = vec![tok.bos_id()];
        ids.extend(tok.encode("he", false));
        ids.push(tok.eos_id());
        assert_eq!(tok.decode(&ids, true, true), b"he");
        assert_eq!(tok.decode(&ids, false, true), b"<s>he</s>");
    }
}

//! Construction of decode batches.

use ib_engine::{Batch, Pos, TokenId};

/// Which slots of a batch ask the engine for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMask {
    /// Only the final slot (prompt evaluation).
    LastOnly,
    /// Every slot (single-token steps).
    All,
    /// No slot (cache prefill).
    None,
}

/// Builds single-sequence batches. Every slot belongs to sequence 0.
pub struct BatchBuilder;

impl BatchBuilder {
    /// Batch holding `tokens` at positions `start..start + tokens.len()`.
    pub fn build(tokens: &[TokenId], start: Pos, mask: OutputMask) -> Batch {
        let n = tokens.len();
        let mut batch = Batch::with_capacity(n);
        for (i, &token) in tokens.iter().enumerate() {
            let output = match mask {
                OutputMask::LastOnly => i + 1 == n,
                OutputMask::All => true,
                OutputMask::None => false,
            };
            batch.add(token, start + i as Pos, &[0], output);
        }
        batch
    }

    /// One-token batch for a generation step.
    pub fn step(token: TokenId, pos: Pos) -> Batch {
        Self::build(&[token], pos, OutputMask::All)
    }
}

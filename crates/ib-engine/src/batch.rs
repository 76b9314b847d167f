/// Token identifier within a model's vocabulary.
pub type TokenId = i32;
/// Position of a token within its sequence.
pub type Pos = i32;
/// Sequence identifier. Only sequence 0 is ever populated by this workspace.
pub type SeqId = i32;

/// One unit of decode work: parallel arrays indexed by batch slot.
///
/// Slot `i` submits `token[i]` at `pos[i]` for every sequence in `seq_id[i]`,
/// and asks the engine to keep logits (or embeddings) for that slot when
/// `logits[i]` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub token: Vec<TokenId>,
    pub pos: Vec<Pos>,
    pub seq_id: Vec<Vec<SeqId>>,
    pub logits: Vec<bool>,
}

impl Batch {
    /// Allocate an empty batch with room for `n_tokens` slots.
    pub fn with_capacity(n_tokens: usize) -> Self {
        Self {
            token: Vec::with_capacity(n_tokens),
            pos: Vec::with_capacity(n_tokens),
            seq_id: Vec::with_capacity(n_tokens),
            logits: Vec::with_capacity(n_tokens),
        }
    }

    /// Append one slot.
    pub fn add(&mut self, token: TokenId, pos: Pos, seq_ids: &[SeqId], logits: bool) {
        self.token.push(token);
        self.pos.push(pos);
        self.seq_id.push(seq_ids.to_vec());
        self.logits.push(logits);
    }

    /// Number of populated slots.
    pub fn n_tokens(&self) -> usize {
        self.token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// Returns true if every parallel array has the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.token.len();
        self.pos.len() == n && self.seq_id.len() == n && self.logits.len() == n
    }

    /// Slots whose output was requested, in batch order.
    pub fn output_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.logits
            .iter()
            .enumerate()
            .filter(|(_, &wanted)| wanted)
            .map(|(i, _)| i)
    }
}

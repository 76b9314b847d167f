/// Per-position hidden-state cache for the reference forward pass.
///
/// Layout: a flat array of shape `[max_seq_len, n_embd]`. Row `p` holds the
/// token embedding submitted at position `p`.
pub struct HiddenCache {
    data: Vec<f32>,
    /// Width of each row.
    pub n_embd: usize,
    /// Maximum sequence length the cache can hold.
    pub max_seq_len: usize,
    /// Number of positions currently valid.
    pub len: usize,
}

impl HiddenCache {
    /// Create a new cache with all values initialized to zero.
    pub fn new(n_embd: usize, max_seq_len: usize) -> Self {
        HiddenCache {
            data: vec![0.0f32; n_embd * max_seq_len],
            n_embd,
            max_seq_len,
            len: 0,
        }
    }

    /// Write `row` at `pos`.
    ///
    /// Writing at a position below the current length rewinds the cache: the
    /// positions after `pos` are no longer valid.
    pub fn update(&mut self, row: &[f32], pos: usize) {
        let offset = pos * self.n_embd;
        self.data[offset..offset + self.n_embd].copy_from_slice(row);
        self.len = pos + 1;
    }

    /// Rows for positions `0..seq_len`.
    pub fn get(&self, seq_len: usize) -> &[f32] {
        &self.data[..seq_len * self.n_embd]
    }

    /// Reset the cache, zeroing all data and setting length to 0.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
        self.len = 0;
    }
}

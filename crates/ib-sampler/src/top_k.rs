use crate::sampler::{Sampler, TokenLogit};

/// Keeps only the `k` highest-logit candidates.
///
/// `k <= 0` disables the filter, as does a `k` at least as large as the
/// candidate list.
pub struct TopKSampler {
    k: i32,
}

impl TopKSampler {
    /// Create a new top-K sampler that retains the `k` highest-logit tokens.
    pub fn new(k: i32) -> Self {
        Self { k }
    }
}

impl Sampler for TopKSampler {
    fn name(&self) -> &str {
        "top_k"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if self.k <= 0 || self.k as usize >= candidates.len() {
            return;
        }

        candidates.sort_by(|a, b| b.logit.partial_cmp(&a.logit).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.k as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(logits: &[f32]) -> Vec<TokenLogit> {
        logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenLogit {
                token_id: i as i32,
                logit,
            })
            .collect()
    }

    #[test]
    fn test_keeps_highest() {
        let mut c = candidates(&[0.1, 5.0, 2.0, 4.0]);
        TopKSampler::new(2).apply(&mut c);
        let ids: Vec<i32> = c.iter().map(|t| t.token_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_disabled() {
        let mut c = candidates(&[0.1, 5.0, 2.0]);
        TopKSampler::new(0).apply(&mut c);
        assert_eq!(c.len(), 3);

        TopKSampler::new(-4).apply(&mut c);
        assert_eq!(c.len(), 3);

        TopKSampler::new(40).apply(&mut c);
        assert_eq!(c.len(), 3);
    }
}

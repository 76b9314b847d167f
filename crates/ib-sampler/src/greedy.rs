use crate::sampler::{Sampler, TokenLogit};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed value that asks [`DistSampler`] to draw its seed from OS entropy.
pub const DEFAULT_SEED: u32 = u32::MAX;

/// Greedy sampler: selects the single token with the highest logit.
pub struct GreedySampler;

impl GreedySampler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GreedySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for GreedySampler {
    fn name(&self) -> &str {
        "greedy"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        let best = candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.logit.partial_cmp(&b.logit).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i);

        if let Some(i) = best {
            candidates.swap(0, i);
            candidates.truncate(1);
        }
    }
}

/// Categorical draw over the softmax of the remaining candidates.
///
/// The RNG lives for the whole chain, so consecutive draws on the same logits
/// are independent rather than repeating the first outcome.
pub struct DistSampler {
    rng: StdRng,
}

impl DistSampler {
    /// Create a distribution sampler. `DEFAULT_SEED` seeds from entropy; any
    /// other value gives a reproducible sequence of draws.
    pub fn new(seed: u32) -> Self {
        let rng = if seed == DEFAULT_SEED {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed as u64)
        };
        Self { rng }
    }
}

impl Sampler for DistSampler {
    fn name(&self) -> &str {
        "dist"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if candidates.is_empty() {
            return;
        }

        let max_logit = candidates
            .iter()
            .map(|t| t.logit)
            .fold(f32::NEG_INFINITY, f32::max);

        let exps: Vec<f32> = candidates.iter().map(|t| (t.logit - max_logit).exp()).collect();
        let sum: f32 = exps.iter().sum();
        let probs: Vec<f32> = exps.iter().map(|e| e / sum).collect();

        let dist = match WeightedIndex::new(&probs) {
            Ok(d) => d,
            Err(_) => {
                // Degenerate weights (NaN or all zero): fall back to argmax.
                GreedySampler.apply(candidates);
                return;
            }
        };

        let selected = candidates[dist.sample(&mut self.rng)].clone();
        candidates.clear();
        candidates.push(selected);
    }
}

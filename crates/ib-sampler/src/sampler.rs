/// Token identifier as understood by the engine's vocabulary.
pub type TokenId = i32;

/// A candidate token paired with its (possibly rescaled) logit.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLogit {
    pub token_id: TokenId,
    pub logit: f32,
}

/// A stage of the sampling pipeline.
///
/// Filters narrow or rescale the candidate list in place; selectors reduce it
/// to a single entry. Stages take `&mut self` because selectors own the random
/// state that advances with every draw.
pub trait Sampler: Send {
    /// Returns the name of this sampler.
    fn name(&self) -> &str;

    /// Modify the candidate list in place (filtering, scaling, selecting).
    fn apply(&mut self, candidates: &mut Vec<TokenLogit>);
}

/// Ordered pipeline of samplers applied to one logit row per draw.
///
/// The last stage should be a selector (distribution draw or greedy). A chain
/// is built for a single generation call and dropped with it.
pub struct SamplerChain {
    samplers: Vec<Box<dyn Sampler>>,
}

impl SamplerChain {
    /// Create a new empty sampler chain.
    pub fn new() -> Self {
        Self {
            samplers: Vec::new(),
        }
    }

    /// Append a stage. Returns self for builder-style usage.
    pub fn with(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.samplers.push(sampler);
        self
    }

    /// Number of stages in the chain.
    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    /// Returns true if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    /// Stage names in application order.
    pub fn names(&self) -> Vec<&str> {
        self.samplers.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `logits` and return the selected token.
    ///
    /// The candidate list starts as one entry per vocabulary index. Returns
    /// `None` only when `logits` is empty or a stage discarded every candidate.
    pub fn sample(&mut self, logits: &[f32]) -> Option<TokenId> {
        let mut candidates: Vec<TokenLogit> = logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenLogit {
                token_id: i as TokenId,
                logit,
            })
            .collect();

        for sampler in self.samplers.iter_mut() {
            sampler.apply(&mut candidates);
        }

        candidates.first().map(|t| t.token_id)
    }
}

impl Default for SamplerChain {
    fn default() -> Self {
        Self::new()
    }
}

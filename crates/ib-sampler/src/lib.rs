pub mod greedy;
pub mod sampler;
pub mod temperature;
pub mod top_k;

pub use greedy::{DistSampler, GreedySampler, DEFAULT_SEED};
pub use sampler::{Sampler, SamplerChain, TokenId, TokenLogit};
pub use temperature::TemperatureSampler;
pub use top_k::TopKSampler;

/// Build the generation chain: top-k, then temperature, then a draw.
///
/// A non-positive temperature ends the chain with a greedy pick instead of a
/// random draw.
pub fn top_k_temperature_chain(top_k: i32, temperature: f32, seed: u32) -> SamplerChain {
    let chain = SamplerChain::new()
        .with(Box::new(TopKSampler::new(top_k)))
        .with(Box::new(TemperatureSampler::new(temperature)));

    if temperature <= 0.0 {
        chain.with(Box::new(GreedySampler::new()))
    } else {
        chain.with(Box::new(DistSampler::new(seed)))
    }
}

//! `edge-sampler` - Token selection for edge-runtime.
//!
//! A `SamplerChain` runs candidate logits through ordered `Sampler` stages.
//! The last stage picks the token; earlier stages rescale or truncate.

pub mod dist;
pub mod greedy;
pub mod params;
pub mod repetition;
pub mod sampler;
pub mod temperature;
pub mod top_k;
pub mod top_p;

pub use dist::{DistSampler, DEFAULT_SEED};
pub use greedy::GreedySampler;
pub use params::SamplerParams;
pub use repetition::RepetitionPenaltySampler;
pub use sampler::{Sampler, SamplerChain, TokenLogit};
pub use temperature::TemperatureSampler;
pub use top_k::TopKSampler;
pub use top_p::TopPSampler;

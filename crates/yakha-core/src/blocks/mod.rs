//! Decoder-block assembly, one wiring per published architecture family.
//!
//! Every block composes the same three collaborators (normalization
//! transforms, a fused attention unit, a feed-forward/MoE unit) in the
//! residual order of its family's published block diagram. The blocks hold
//! no mutable state of their own; whatever the attention unit caches is its
//! private business.

pub mod cohere;
pub mod contract;
pub mod falcon;
pub mod gemma2;
pub mod llama;
pub mod mixtral;
pub mod mpt;
pub mod phi3;
pub mod qwen;
pub mod stack;

pub use cohere::CohereBlock;
pub use contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
pub use falcon::{FalconBlock, FalconNorms};
pub use gemma2::Gemma2Block;
pub use llama::LlamaLikeBlock;
pub use mixtral::MixtralBlock;
pub use mpt::MptBlock;
pub use phi3::Phi3Block;
pub use qwen::QwenBlock;
pub use stack::DecoderStack;

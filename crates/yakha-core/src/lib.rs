//! Yakha Core - Decoder-Block Assembly for Fused Transformer Inference
//!
//! This crate wires published decoder architectures (Llama/Mistral, Mixtral,
//! Qwen2/Qwen3, Gemma2, Cohere, MPT, Falcon, Phi-3) out of three opaque
//! collaborators: normalization transforms, a fused quantization-aware
//! attention unit, and a feed-forward/MoE unit. Each family gets one block
//! type encoding its published residual-and-normalization order; the heavy
//! lifting (quantized matmuls, rotary/ALiBi math, KV-cache management)
//! stays behind the [`blocks::AttentionUnit`] contract.
//!
//! # Example
//!
//! ```ignore
//! use yakha_core::{AttentionSpec, DecoderConfig, LlamaLikeBlock};
//!
//! let cfg = DecoderConfig::from_file(&model_dir.join("config.json"))?;
//! let spec = AttentionSpec::llama(&cfg);
//! let mut block = LlamaLikeBlock::new(spec, norm1, attn, norm2, mlp, device);
//! let out = block.forward(&hidden_states)?;
//! ```

pub mod blocks;
pub mod config;
pub mod device;
pub mod error;
pub mod family;

pub use blocks::{
    AttentionSpec, AttentionUnit, CohereBlock, DecoderBlock, DecoderStack, FalconBlock,
    FalconNorms, FeedForward, Gemma2Block, LlamaLikeBlock, MixtralBlock, MptBlock, Normalization,
    Phi3Block, QwenBlock,
};
pub use config::{DecoderConfig, RopeScalingConfig};
pub use device::{DeviceKind, DeviceProfile, DeviceSelector};
pub use error::{Error, Result};
pub use family::ModelFamily;

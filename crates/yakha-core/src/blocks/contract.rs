//! Contracts between decoder blocks and their collaborators.
//!
//! A block owns three kinds of submodule: normalization transforms, one
//! fused attention unit, and one feed-forward (or MoE) unit. All of them
//! are opaque here: the block only relies on the same-shape tensor
//! contract. The attention unit is the quantization-aware engine that owns
//! kernel dispatch, rotary/ALiBi handling and the KV cache; none of that
//! leaks into this layer.

use candle_core::{Device, Module, Tensor};

use crate::config::{DecoderConfig, RopeScalingConfig};
use crate::error::{Error, Result};

/// Fused multi-head attention collaborator.
///
/// `forward` takes normalized hidden states of shape `[batch, seq, hidden]`
/// and returns a tensor of the same shape. The unit privately manages its
/// KV cache and position bookkeeping, hence `&mut self`; cache-related
/// outputs of the underlying engine are not surfaced through this contract.
pub trait AttentionUnit: Send {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor>;
}

/// Feed-forward collaborator: dense MLP or MoE router, same-shape transform.
pub trait FeedForward: Send {
    fn forward(&self, xs: &Tensor) -> Result<Tensor>;
}

impl<M: Module + Send> FeedForward for M {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Module::forward(self, xs).map_err(Error::from)
    }
}

/// Normalization collaborator: same-shape transform.
///
/// `candle_nn::RmsNorm` and `candle_nn::LayerNorm` satisfy this through the
/// blanket `Module` impl.
pub trait Normalization: Send {
    fn forward(&self, xs: &Tensor) -> Result<Tensor>;
}

impl<M: Module + Send> Normalization for M {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Module::forward(self, xs).map_err(Error::from)
    }
}

/// The surface every family block exposes to the model-level driver.
pub trait DecoderBlock: Send {
    /// One synchronous forward pass; output shape equals input shape.
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor>;

    fn hidden_size(&self) -> usize;

    fn device(&self) -> &Device;
}

/// Plain scalar configuration handed to the attention collaborator at
/// construction time and kept on the block for introspection.
#[derive(Debug, Clone)]
pub struct AttentionSpec {
    pub hidden_size: usize,
    pub num_heads: usize,
    pub num_kv_heads: usize,
    /// Override for checkpoints whose head dimension is not
    /// `hidden_size / num_heads` (Gemma-7B, Qwen3).
    pub head_dim: Option<usize>,
    pub max_seq_len: usize,
    pub rope_theta: f64,
    pub partial_rotary_factor: f64,
    pub rope_scaling: Option<RopeScalingConfig>,
    /// ALiBi position bias instead of rotary embeddings (MPT).
    pub use_alibi: bool,
    /// GPT-NeoX rotary layout; Cohere uses the interleaved (GPT-J) layout.
    pub neox_rotary: bool,
    /// Attention logit softcap (Gemma2); applied inside the attention unit.
    pub attn_logit_softcapping: Option<f64>,
}

impl AttentionSpec {
    fn base(cfg: &DecoderConfig) -> Self {
        Self {
            hidden_size: cfg.hidden_size,
            num_heads: cfg.num_attention_heads,
            num_kv_heads: cfg.num_kv_heads(),
            head_dim: cfg.head_dim,
            max_seq_len: cfg.max_position_embeddings,
            rope_theta: cfg.rope_theta,
            partial_rotary_factor: cfg.partial_rotary_factor,
            rope_scaling: None,
            use_alibi: false,
            neox_rotary: true,
            attn_logit_softcapping: None,
        }
    }

    /// Llama, Mistral, Aquila and other straight Llama derivatives.
    pub fn llama(cfg: &DecoderConfig) -> Self {
        Self::base(cfg)
    }

    /// Mixtral: Llama attention in front of a MoE feed-forward.
    pub fn mixtral(cfg: &DecoderConfig) -> Self {
        Self::base(cfg)
    }

    /// Qwen2/Qwen3; the family's q/k-norm stages are built into the
    /// attention unit itself and need no scalar here.
    pub fn qwen(cfg: &DecoderConfig) -> Self {
        Self::base(cfg)
    }

    /// Gemma2 carries the attention logit softcap.
    pub fn gemma2(cfg: &DecoderConfig) -> Self {
        Self {
            attn_logit_softcapping: cfg.attn_logit_softcapping,
            ..Self::base(cfg)
        }
    }

    /// Cohere uses the interleaved rotary layout.
    pub fn cohere(cfg: &DecoderConfig) -> Self {
        Self {
            neox_rotary: false,
            ..Self::base(cfg)
        }
    }

    /// MPT: ALiBi positions, no rotary embedding.
    pub fn mpt(cfg: &DecoderConfig) -> Self {
        Self {
            use_alibi: true,
            ..Self::base(cfg)
        }
    }

    pub fn falcon(cfg: &DecoderConfig) -> Self {
        Self::base(cfg)
    }

    /// Phi-3 forwards its rope scaling (longrope) to the attention unit.
    pub fn phi3(cfg: &DecoderConfig) -> Self {
        Self {
            rope_scaling: cfg.rope_scaling.clone(),
            ..Self::base(cfg)
        }
    }

    /// Resolved per-head dimension.
    pub fn head_dim(&self) -> usize {
        self.head_dim.unwrap_or(self.hidden_size / self.num_heads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DecoderConfig {
        DecoderConfig::from_json_str(
            r#"{
                "hidden_size": 4096,
                "num_attention_heads": 32,
                "num_key_value_heads": 8,
                "max_position_embeddings": 32768,
                "rope_theta": 1000000.0,
                "attn_logit_softcapping": 50.0,
                "rope_scaling": {"type": "longrope", "factor": 4.0}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn llama_spec_defaults() {
        let spec = AttentionSpec::llama(&test_config());
        assert_eq!(spec.num_kv_heads, 8);
        assert_eq!(spec.head_dim(), 128);
        assert!(spec.neox_rotary);
        assert!(!spec.use_alibi);
        assert!(spec.rope_scaling.is_none());
        assert!(spec.attn_logit_softcapping.is_none());
    }

    #[test]
    fn gemma2_spec_carries_softcap() {
        let spec = AttentionSpec::gemma2(&test_config());
        assert_eq!(spec.attn_logit_softcapping, Some(50.0));
    }

    #[test]
    fn cohere_spec_is_interleaved() {
        let spec = AttentionSpec::cohere(&test_config());
        assert!(!spec.neox_rotary);
    }

    #[test]
    fn mpt_spec_uses_alibi() {
        let spec = AttentionSpec::mpt(&test_config());
        assert!(spec.use_alibi);
    }

    #[test]
    fn phi3_spec_forwards_rope_scaling() {
        let spec = AttentionSpec::phi3(&test_config());
        assert_eq!(
            spec.rope_scaling.unwrap().rope_type.as_deref(),
            Some("longrope")
        );
    }

    #[test]
    fn head_dim_override() {
        let mut spec = AttentionSpec::llama(&test_config());
        spec.head_dim = Some(256);
        assert_eq!(spec.head_dim(), 256);
    }

    #[test]
    fn candle_rms_norm_plugs_in_as_normalization() {
        use candle_core::{DType, Device, Tensor};

        let weight = Tensor::ones(8, DType::F32, &Device::Cpu).unwrap();
        let norm: Box<dyn Normalization> = Box::new(candle_nn::RmsNorm::new(weight, 1e-6));

        // A constant row normalizes to the (all-ones) weight.
        let xs = Tensor::full(3.0f32, (1, 2, 8), &Device::Cpu).unwrap();
        let out = norm.forward(&xs).unwrap();

        assert_eq!(out.dims(), xs.dims());
        for value in out.flatten_all().unwrap().to_vec1::<f32>().unwrap() {
            assert!((value - 1.0).abs() < 1e-4, "expected ~1.0, got {value}");
        }
    }
}

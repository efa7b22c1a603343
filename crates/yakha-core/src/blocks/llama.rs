//! Llama-family decoder block.
//!
//! Reused across architectures that follow the Llama block diagram verbatim,
//! e.g. Mistral and Aquila: pre-norm attention and feed-forward sublayers,
//! each wrapped in its own residual addition.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct LlamaLikeBlock {
    spec: AttentionSpec,
    input_layernorm: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    post_attention_layernorm: Box<dyn Normalization>,
    mlp: Box<dyn FeedForward>,
    device: Device,
}

impl LlamaLikeBlock {
    pub fn new(
        spec: AttentionSpec,
        input_layernorm: Box<dyn Normalization>,
        attn: Box<dyn AttentionUnit>,
        post_attention_layernorm: Box<dyn Normalization>,
        mlp: Box<dyn FeedForward>,
        device: Device,
    ) -> Self {
        Self {
            spec,
            input_layernorm,
            attn,
            post_attention_layernorm,
            mlp,
            device,
        }
    }

    pub fn spec(&self) -> &AttentionSpec {
        &self.spec
    }

    /// `h = x + attn(norm1(x)); out = h + mlp(norm2(h))`
    pub fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let normed = self.input_layernorm.forward(hidden_states)?;
        let attn_out = self.attn.forward(&normed)?;

        let h = hidden_states.broadcast_add(&attn_out)?;
        let mlp_out = self
            .mlp
            .forward(&self.post_attention_layernorm.forward(&h)?)?;
        let out = h.broadcast_add(&mlp_out)?;

        Ok(out)
    }
}

impl DecoderBlock for LlamaLikeBlock {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        LlamaLikeBlock::forward(self, hidden_states)
    }

    fn hidden_size(&self) -> usize {
        self.spec.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

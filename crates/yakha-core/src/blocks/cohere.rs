//! Cohere (Command-R) decoder block.
//!
//! Cohere normalizes the block input once and reuses that tensor for BOTH
//! sublayers: the feed-forward consumes the pre-attention normalized tensor,
//! not the post-attention residual sum. The rotary layout is interleaved
//! (non-neox), recorded on the spec for the attention unit.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct CohereBlock {
    spec: AttentionSpec,
    input_layernorm: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    mlp: Box<dyn FeedForward>,
    device: Device,
}

impl CohereBlock {
    pub fn new(
        spec: AttentionSpec,
        input_layernorm: Box<dyn Normalization>,
        attn: Box<dyn AttentionUnit>,
        mlp: Box<dyn FeedForward>,
        device: Device,
    ) -> Self {
        Self {
            spec,
            input_layernorm,
            attn,
            mlp,
            device,
        }
    }

    pub fn spec(&self) -> &AttentionSpec {
        &self.spec
    }

    /// `n = norm(x); out = x + attn(n) + mlp(n)`
    pub fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let normed = self.input_layernorm.forward(hidden_states)?;
        let attn_out = self.attn.forward(&normed)?;

        let h = hidden_states.broadcast_add(&attn_out)?;
        let mlp_out = self.mlp.forward(&normed)?;
        let out = h.broadcast_add(&mlp_out)?;

        Ok(out)
    }
}

impl DecoderBlock for CohereBlock {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        CohereBlock::forward(self, hidden_states)
    }

    fn hidden_size(&self) -> usize {
        self.spec.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

//! MPT decoder block: Llama-shaped pre-norm wiring, ALiBi position bias
//! instead of rotary embeddings. The ALiBi slopes are the attention unit's
//! concern; the block only records `use_alibi` on the spec.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct MptBlock {
    spec: AttentionSpec,
    norm_1: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    norm_2: Box<dyn Normalization>,
    ffn: Box<dyn FeedForward>,
    device: Device,
}

impl MptBlock {
    pub fn new(
        spec: AttentionSpec,
        norm_1: Box<dyn Normalization>,
        attn: Box<dyn AttentionUnit>,
        norm_2: Box<dyn Normalization>,
        ffn: Box<dyn FeedForward>,
        device: Device,
    ) -> Self {
        Self {
            spec,
            norm_1,
            attn,
            norm_2,
            ffn,
            device,
        }
    }

    pub fn spec(&self) -> &AttentionSpec {
        &self.spec
    }

    pub fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let normed = self.norm_1.forward(hidden_states)?;
        let attn_out = self.attn.forward(&normed)?;

        let h = hidden_states.broadcast_add(&attn_out)?;
        let ffn_out = self.ffn.forward(&self.norm_2.forward(&h)?)?;
        let out = h.broadcast_add(&ffn_out)?;

        Ok(out)
    }
}

impl DecoderBlock for MptBlock {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        MptBlock::forward(self, hidden_states)
    }

    fn hidden_size(&self) -> usize {
        self.spec.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

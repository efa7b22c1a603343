//! Qwen2/Qwen3 decoder block.
//!
//! The residual wiring is identical to Llama's; what sets the family apart
//! is per-head q/k normalization, which lives inside the attention unit the
//! block is constructed with (the unit receives the q/k norm weights at load
//! time). Qwen3 checkpoints also carry a `head_dim` override in the spec.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct QwenBlock {
    spec: AttentionSpec,
    input_layernorm: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    post_attention_layernorm: Box<dyn Normalization>,
    mlp: Box<dyn FeedForward>,
    device: Device,
}

impl QwenBlock {
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

impl DecoderBlock for QwenBlock {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        QwenBlock::forward(self, hidden_states)
    }

    fn hidden_size(&self) -> usize {
        self.spec.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::testing::{assert_close, sample_input, test_spec, Scale, ShiftAttention};

    #[test]
    fn wiring_matches_llama_diagram() {
        let mut block = QwenBlock::new(
            test_spec(),
            Box::new(Scale(2.0)),
            Box::new(ShiftAttention(1.0)),
            Box::new(Scale(2.0)),
            Box::new(Scale(3.0)),
            Device::Cpu,
        );
        let input = sample_input(&Device::Cpu);
        let output = block.forward(&input).unwrap();

        assert_eq!(output.dims(), input.dims());
        let expected = input.affine(21.0, 7.0).unwrap();
        assert_close(&output, &expected);
    }

    #[test]
    fn head_dim_override_is_respected() {
        let mut spec = test_spec();
        spec.head_dim = Some(16);
        let block = QwenBlock::new(
            spec,
            Box::new(Scale(1.0)),
            Box::new(ShiftAttention(0.0)),
            Box::new(Scale(1.0)),
            Box::new(Scale(1.0)),
            Device::Cpu,
        );
        assert_eq!(block.spec().head_dim(), 16);
    }
}

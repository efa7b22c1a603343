//! Phi-3 decoder block: Llama residual wiring; the family's long-context
//! rope scaling (longrope) travels on the spec into the attention unit.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct Phi3Block {
    spec: AttentionSpec,
    input_layernorm: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    post_attention_layernorm: Box<dyn Normalization>,
    mlp: Box<dyn FeedForward>,
    device: Device,
}

impl Phi3Block {
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

impl DecoderBlock for Phi3Block {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        Phi3Block::forward(self, hidden_states)
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
    use crate::config::RopeScalingConfig;

    #[test]
    fn wiring_matches_llama_diagram() {
        let mut block = Phi3Block::new(
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
    fn spec_carries_rope_scaling() {
        let mut spec = test_spec();
        spec.rope_scaling = Some(RopeScalingConfig {
            rope_type: Some("longrope".to_string()),
            factor: Some(8.0),
            original_max_position_embeddings: Some(4096),
            low_freq_factor: None,
            high_freq_factor: None,
        });
        let block = Phi3Block::new(
            spec,
            Box::new(Scale(1.0)),
            Box::new(ShiftAttention(0.0)),
            Box::new(Scale(1.0)),
            Box::new(Scale(1.0)),
            Device::Cpu,
        );
        let scaling = block.spec().rope_scaling.as_ref().unwrap();
        assert_eq!(scaling.rope_type.as_deref(), Some("longrope"));
    }
}

//! Mixtral decoder block: Llama attention wiring in front of a sparse MoE
//! feed-forward. The expert routing is entirely the MoE collaborator's
//! concern; the block only places it on the second residual path.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct MixtralBlock {
    spec: AttentionSpec,
    input_layernorm: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    post_attention_layernorm: Box<dyn Normalization>,
    moe: Box<dyn FeedForward>,
    device: Device,
}

impl MixtralBlock {
    pub fn new(
        spec: AttentionSpec,
        input_layernorm: Box<dyn Normalization>,
        attn: Box<dyn AttentionUnit>,
        post_attention_layernorm: Box<dyn Normalization>,
        moe: Box<dyn FeedForward>,
        device: Device,
    ) -> Self {
        Self {
            spec,
            input_layernorm,
            attn,
            post_attention_layernorm,
            moe,
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
        let moe_out = self
            .moe
            .forward(&self.post_attention_layernorm.forward(&h)?)?;
        let out = h.broadcast_add(&moe_out)?;

        Ok(out)
    }
}

impl DecoderBlock for MixtralBlock {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        MixtralBlock::forward(self, hidden_states)
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
    fn moe_sits_on_second_residual_path() {
        // norm1 = 2x, attn = 2x + 1, h = 3x + 1,
        // moe = 5 * 2 * h, out = 11h = 33x + 11.
        let mut block = MixtralBlock::new(
            test_spec(),
            Box::new(Scale(2.0)),
            Box::new(ShiftAttention(1.0)),
            Box::new(Scale(2.0)),
            Box::new(Scale(5.0)),
            Device::Cpu,
        );
        let input = sample_input(&Device::Cpu);
        let output = block.forward(&input).unwrap();

        assert_eq!(output.dims(), input.dims());
        let expected = input.affine(33.0, 11.0).unwrap();
        assert_close(&output, &expected);
    }
}

//! Falcon decoder block.
//!
//! Falcon runs attention and feed-forward in PARALLEL off the block input
//! and folds both into a single residual stream: `out = x + attn + mlp`.
//! The two published norm arrangements differ only in how the branch inputs
//! are normalized:
//!
//! - new decoder arch (Falcon-40B and later): separate `ln_attn` / `ln_mlp`,
//!   each applied to the block input;
//! - legacy arch (Falcon-7B): one `input_layernorm` whose output feeds both
//!   branches.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

/// Norm arrangement for the two published Falcon decoder generations.
pub enum FalconNorms {
    Parallel {
        ln_attn: Box<dyn Normalization>,
        ln_mlp: Box<dyn Normalization>,
    },
    Legacy {
        input_layernorm: Box<dyn Normalization>,
    },
}

pub struct FalconBlock {
    spec: AttentionSpec,
    norms: FalconNorms,
    attn: Box<dyn AttentionUnit>,
    mlp: Box<dyn FeedForward>,
    device: Device,
}

impl FalconBlock {
    pub fn new(
        spec: AttentionSpec,
        norms: FalconNorms,
        attn: Box<dyn AttentionUnit>,
        mlp: Box<dyn FeedForward>,
        device: Device,
    ) -> Self {
        Self {
            spec,
            norms,
            attn,
            mlp,
            device,
        }
    }

    pub fn spec(&self) -> &AttentionSpec {
        &self.spec
    }

    pub fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let (attn_in, mlp_in) = match &self.norms {
            FalconNorms::Parallel { ln_attn, ln_mlp } => (
                ln_attn.forward(hidden_states)?,
                ln_mlp.forward(hidden_states)?,
            ),
            FalconNorms::Legacy { input_layernorm } => {
                let normed = input_layernorm.forward(hidden_states)?;
                (normed.clone(), normed)
            }
        };

        let attn_out = self.attn.forward(&attn_in)?;
        let h_attn = hidden_states.broadcast_add(&attn_out)?;
        let mlp_out = self.mlp.forward(&mlp_in)?;
        let out = h_attn.broadcast_add(&mlp_out)?;

        Ok(out)
    }
}

impl DecoderBlock for FalconBlock {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        FalconBlock::forward(self, hidden_states)
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
    use crate::blocks::testing::{
        assert_close, sample_input, test_spec, RecordingScale, Scale, ShiftAttention,
    };

    #[test]
    fn parallel_arch_norms_both_take_block_input() {
        // attn branch: 2x + 1, mlp branch: 5 * 3x, out = x + 2x + 1 + 15x.
        let (ln_attn, seen_attn) = RecordingScale::new(2.0);
        let (ln_mlp, seen_mlp) = RecordingScale::new(3.0);
        let mut block = FalconBlock::new(
            test_spec(),
            FalconNorms::Parallel {
                ln_attn: Box::new(ln_attn),
                ln_mlp: Box::new(ln_mlp),
            },
            Box::new(ShiftAttention(1.0)),
            Box::new(Scale(5.0)),
            Device::Cpu,
        );

        let input = sample_input(&Device::Cpu);
        let output = block.forward(&input).unwrap();

        assert_eq!(output.dims(), input.dims());
        let expected = input.affine(18.0, 1.0).unwrap();
        assert_close(&output, &expected);

        assert_close(&seen_attn.lock().unwrap()[0], &input);
        assert_close(&seen_mlp.lock().unwrap()[0], &input);
    }

    #[test]
    fn legacy_arch_shares_one_normed_tensor() {
        // n = 2x feeds both branches: out = x + (2x + 1) + 5*2x = 13x + 1.
        let (norm, seen) = RecordingScale::new(2.0);
        let mut block = FalconBlock::new(
            test_spec(),
            FalconNorms::Legacy {
                input_layernorm: Box::new(norm),
            },
            Box::new(ShiftAttention(1.0)),
            Box::new(Scale(5.0)),
            Device::Cpu,
        );

        let input = sample_input(&Device::Cpu);
        let output = block.forward(&input).unwrap();

        let expected = input.affine(13.0, 1.0).unwrap();
        assert_close(&output, &expected);

        // The single norm fires once; its output is shared.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}

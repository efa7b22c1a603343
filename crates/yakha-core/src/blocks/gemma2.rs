//! Gemma2 decoder block.
//!
//! Gemma2 sandwiches both sublayers between norms: exactly four
//! normalization stages and exactly two residual additions per forward
//! call, in this order:
//!
//! ```text
//! residual = x
//! x = input_layernorm(x)
//! x = attn(x)
//! x = post_attention_layernorm(x)
//! x = residual + x
//! residual = x
//! x = pre_feedforward_layernorm(x)
//! x = mlp(x)
//! x = post_feedforward_layernorm(x)
//! out = residual + x
//! ```
//!
//! The attention logit softcap is scalar configuration on the
//! [`AttentionSpec`]; applying it is the attention unit's job.

use candle_core::{Device, Tensor};

use super::contract::{AttentionSpec, AttentionUnit, DecoderBlock, FeedForward, Normalization};
use crate::error::Result;

pub struct Gemma2Block {
    spec: AttentionSpec,
    input_layernorm: Box<dyn Normalization>,
    attn: Box<dyn AttentionUnit>,
    post_attention_layernorm: Box<dyn Normalization>,
    pre_feedforward_layernorm: Box<dyn Normalization>,
    mlp: Box<dyn FeedForward>,
    post_feedforward_layernorm: Box<dyn Normalization>,
    device: Device,
}

impl Gemma2Block {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: AttentionSpec,
        input_layernorm: Box<dyn Normalization>,
        attn: Box<dyn AttentionUnit>,
        post_attention_layernorm: Box<dyn Normalization>,
        pre_feedforward_layernorm: Box<dyn Normalization>,
        mlp: Box<dyn FeedForward>,
        post_feedforward_layernorm: Box<dyn Normalization>,
        device: Device,
    ) -> Self {
        Self {
            spec,
            input_layernorm,
            attn,
            post_attention_layernorm,
            pre_feedforward_layernorm,
            mlp,
            post_feedforward_layernorm,
            device,
        }
    }

    pub fn spec(&self) -> &AttentionSpec {
        &self.spec
    }

    pub fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let residual = hidden_states;
        let xs = self.input_layernorm.forward(hidden_states)?;
        let xs = self.attn.forward(&xs)?;
        let xs = self.post_attention_layernorm.forward(&xs)?;
        let xs = residual.broadcast_add(&xs)?;

        let residual = &xs;
        let ys = self.pre_feedforward_layernorm.forward(&xs)?;
        let ys = self.mlp.forward(&ys)?;
        let ys = self.post_feedforward_layernorm.forward(&ys)?;
        let out = residual.broadcast_add(&ys)?;

        Ok(out)
    }
}

impl DecoderBlock for Gemma2Block {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        Gemma2Block::forward(self, hidden_states)
    }

    fn hidden_size(&self) -> usize {
        self.spec.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

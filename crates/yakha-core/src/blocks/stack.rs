//! Sequential driver folding hidden states through a stack of decoder
//! blocks. One synchronous pass, no scheduling; batching and streaming live
//! above this layer.

use candle_core::Tensor;
use tracing::{debug, info};

use super::contract::DecoderBlock;
use crate::error::Result;

pub struct DecoderStack {
    blocks: Vec<Box<dyn DecoderBlock>>,
}

impl DecoderStack {
    pub fn new(blocks: Vec<Box<dyn DecoderBlock>>) -> Self {
        info!("Assembled decoder stack with {} layers", blocks.len());
        Self { blocks }
    }

    pub fn push(&mut self, block: Box<dyn DecoderBlock>) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let mut xs = hidden_states.clone();
        for (idx, block) in self.blocks.iter_mut().enumerate() {
            debug!("decoder layer {idx}");
            xs = block.forward(&xs)?;
        }
        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;
    use crate::blocks::llama::LlamaLikeBlock;
    use crate::blocks::testing::{assert_close, sample_input, test_spec, Scale, ShiftAttention};

    fn stub_block() -> Box<dyn DecoderBlock> {
        Box::new(LlamaLikeBlock::new(
            test_spec(),
            Box::new(Scale(2.0)),
            Box::new(ShiftAttention(1.0)),
            Box::new(Scale(2.0)),
            Box::new(Scale(3.0)),
            Device::Cpu,
        ))
    }

    #[test]
    fn chains_blocks_in_order() {
        // One stub block computes 21x + 7; two chained give 441x + 154.
        let mut stack = DecoderStack::new(vec![stub_block(), stub_block()]);
        assert_eq!(stack.len(), 2);

        let input = sample_input(&Device::Cpu);
        let output = stack.forward(&input).unwrap();

        assert_eq!(output.dims(), input.dims());
        let expected = input.affine(441.0, 154.0).unwrap();
        assert_close(&output, &expected);
    }

    #[test]
    fn empty_stack_is_identity() {
        let mut stack = DecoderStack::new(Vec::new());
        assert!(stack.is_empty());

        let input = sample_input(&Device::Cpu);
        let output = stack.forward(&input).unwrap();
        assert_close(&output, &input);
    }

    #[test]
    fn push_appends() {
        let mut stack = DecoderStack::new(Vec::new());
        stack.push(stub_block());
        assert_eq!(stack.len(), 1);
    }
}

//! Next-pitch sequence model.
//!
//! [`SequenceModel`] is the seam the training loop depends on: anything that
//! maps a [`PitchSequenceInput`] to vocabulary logits. [`LastPitchTransformer`]
//! is the transformer encoder shipped with the trainer.

pub mod last_pitch;

use burn::prelude::*;
use pitch_data::PitchSequenceInput;

pub use last_pitch::{LastPitchTransformer, LastPitchTransformerConfig};

/// A model callable with the structured pitch sequence input.
///
/// Output shape: `(batch, vocab_size)` unnormalized logits.
pub trait SequenceModel<B: Backend> {
    fn forward(&self, input: PitchSequenceInput<B>) -> Tensor<B, 2>;
}

//! Loss functions the epoch runner can optimize against.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;

/// Scalar, differentiable loss over model logits and class targets.
///
/// # Arguments
/// - `logits`: shape `(batch, vocab_size)`
/// - `targets`: shape `(batch,)` class indices
///
/// # Returns
/// Loss tensor of shape `(1,)`.
pub trait Criterion<B: Backend> {
    fn loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1>;
}

/// Mean cross-entropy over the batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyCriterion;

impl<B: Backend> Criterion<B> for CrossEntropyCriterion {
    fn loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets)
    }
}

//! One pass over a batch source, in training or evaluation mode.
//!
//! The mode is carried by the types: [`train_epoch`] needs an autodiff model
//! and an optimizer, [`evaluate_epoch`] takes any backend and is normally
//! handed `model.valid()`, which cannot build a gradient graph.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use pitch_data::BatchSource;
use pitch_model::SequenceModel;

use crate::loss::Criterion;
use crate::metrics::{LossAccumulator, Phase};

/// Train `model` for one pass over `source` and return it with the mean
/// batch loss.
///
/// Each batch gets exactly one optimizer step. Gradients are rebuilt from
/// each backward pass, so nothing accumulates across batches. A non-finite
/// loss aborts before its step is applied.
pub fn train_epoch<B, M, O, L>(
    mut model: M,
    optimizer: &mut O,
    learning_rate: f64,
    source: &dyn BatchSource<B>,
    criterion: &L,
    device: &B::Device,
) -> anyhow::Result<(M, f64)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + SequenceModel<B>,
    O: Optimizer<M, B>,
    L: Criterion<B> + ?Sized,
{
    let mut acc = LossAccumulator::new(Phase::Train);

    for batch in source.batches() {
        let batch = batch?.to_device(device);
        let logits = model.forward(batch.input);
        let loss = criterion.loss(logits, batch.targets);

        let value: f64 = loss.clone().into_scalar().elem();
        acc.push(value)?;

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(learning_rate, model, grads);
    }

    let mean = acc.mean()?;
    tracing::debug!(batches = acc.batches(), loss = mean, "Train pass complete");
    Ok((model, mean))
}

/// Mean batch loss of `model` over `source` with no parameter updates.
///
/// Running it twice on the same model and source gives the same result.
pub fn evaluate_epoch<B, M, L>(
    model: &M,
    source: &dyn BatchSource<B>,
    criterion: &L,
    device: &B::Device,
) -> anyhow::Result<f64>
where
    B: Backend,
    M: SequenceModel<B>,
    L: Criterion<B> + ?Sized,
{
    let mut acc = LossAccumulator::new(Phase::Validation);

    for batch in source.batches() {
        let batch = batch?.to_device(device);
        let logits = model.forward(batch.input);
        let value: f64 = criterion.loss(logits, batch.targets).into_scalar().elem();
        acc.push(value)?;
    }

    let mean = acc.mean()?;
    tracing::debug!(batches = acc.batches(), loss = mean, "Validation pass complete");
    Ok(mean)
}

//! Epoch-level training loop.
//!
//! Alternates a training pass and a validation pass per epoch, logs both
//! averages to a [`ScalarSink`], and publishes the final model once all
//! epochs are done.

use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use pitch_data::BatchSource;
use pitch_model::SequenceModel;

use crate::checkpoint::{CheckpointPublisher, FINAL_DIR, MODEL_FILE};
use crate::epoch::{evaluate_epoch, train_epoch};
use crate::error::TrainError;
use crate::loss::Criterion;
use crate::metrics::{EpochReport, Phase};
use crate::sink::ScalarSink;
use crate::store::join_paths;

/// Configuration for the training loop.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Number of full passes over the training source. Zero is allowed.
    #[config(default = 10)]
    pub num_epochs: usize,
    /// Constant Adam learning rate.
    #[config(default = 1e-3)]
    pub learning_rate: f64,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::InvalidLearningRate(self.learning_rate));
        }
        Ok(())
    }
}

/// Result of a completed run.
pub struct FitOutcome<M> {
    pub model: M,
    /// One report per epoch, in order.
    pub history: Vec<EpochReport>,
    /// Where the final checkpoint was written.
    pub checkpoint_path: String,
}

/// Drives epochs and owns the run's outputs: metrics and the final checkpoint.
pub struct Trainer<'a> {
    config: TrainingConfig,
    sink: &'a mut dyn ScalarSink,
    publisher: CheckpointPublisher<'a>,
    output_directory: String,
}

impl<'a> Trainer<'a> {
    /// Fails if the learning rate is not a positive finite number or the
    /// output directory cannot be joined into a checkpoint path.
    pub fn new(
        config: TrainingConfig,
        sink: &'a mut dyn ScalarSink,
        publisher: CheckpointPublisher<'a>,
        output_directory: impl Into<String>,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        let output_directory = output_directory.into();
        join_paths(&output_directory, &[FINAL_DIR, MODEL_FILE]).map_err(|source| {
            TrainError::InvalidOutputRoot {
                root: output_directory.clone(),
                source,
            }
        })?;
        Ok(Self {
            config,
            sink,
            publisher,
            output_directory,
        })
    }

    /// Train with a fresh Adam optimizer that lives for the whole run.
    pub fn fit<B, M, L>(
        &mut self,
        model: M,
        train: &dyn BatchSource<B>,
        validation: &dyn BatchSource<B::InnerBackend>,
        criterion: &L,
        device: &B::Device,
    ) -> anyhow::Result<FitOutcome<M>>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + SequenceModel<B>,
        M::InnerModule: SequenceModel<B::InnerBackend>,
        L: Criterion<B> + Criterion<B::InnerBackend>,
    {
        let optimizer = AdamConfig::new().init::<B, M>();
        let (outcome, _optimizer) =
            self.fit_with_optimizer(model, optimizer, train, validation, criterion, device)?;
        Ok(outcome)
    }

    /// Train with a caller-supplied optimizer. Its state carries across
    /// epochs and is never reset; it is handed back as it stood after the
    /// last step.
    ///
    /// For each epoch `i` in `1..=num_epochs`: train, log
    /// `train/avg_loss` at step `i`, validate the freshly updated model, log
    /// `val/avg_loss` at step `i`, print the epoch summary, flush the sink.
    /// The final model is then published under the output directory.
    pub fn fit_with_optimizer<B, M, O, L>(
        &mut self,
        mut model: M,
        mut optimizer: O,
        train: &dyn BatchSource<B>,
        validation: &dyn BatchSource<B::InnerBackend>,
        criterion: &L,
        device: &B::Device,
    ) -> anyhow::Result<(FitOutcome<M>, O)>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + SequenceModel<B>,
        M::InnerModule: SequenceModel<B::InnerBackend>,
        O: Optimizer<M, B>,
        L: Criterion<B> + Criterion<B::InnerBackend>,
    {
        let num_epochs = self.config.num_epochs;
        let mut history = Vec::with_capacity(num_epochs);

        tracing::info!(
            num_epochs,
            learning_rate = self.config.learning_rate,
            train_batches = train.num_batches(),
            val_batches = validation.num_batches(),
            "Starting training"
        );

        for epoch in 1..=num_epochs {
            let start = Instant::now();

            let (trained, train_loss) = train_epoch(
                model,
                &mut optimizer,
                self.config.learning_rate,
                train,
                criterion,
                device,
            )?;
            model = trained;
            self.sink
                .add_scalar(Phase::Train.metric_tag(), train_loss, epoch)?;

            let val_loss = evaluate_epoch::<B::InnerBackend, _, _>(
                &model.valid(),
                validation,
                criterion,
                device,
            )?;
            self.sink
                .add_scalar(Phase::Validation.metric_tag(), val_loss, epoch)?;

            let report = EpochReport {
                epoch,
                num_epochs,
                train_loss,
                val_loss,
                elapsed_secs: start.elapsed().as_secs_f64(),
            };
            println!("{report}");
            tracing::debug!(epoch, train_loss, val_loss, "Epoch complete");
            self.sink.flush()?;
            history.push(report);
        }

        let checkpoint_path = self
            .publisher
            .publish::<B, M>(&model, &self.output_directory)?;
        println!("Saved final model to {checkpoint_path}");

        Ok((
            FitOutcome {
                model,
                history,
                checkpoint_path,
            },
            optimizer,
        ))
    }
}

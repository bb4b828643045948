//! Integration tests for the pitch-train crate.
//!
//! These drive the epoch runner and the training loop end to end with a
//! tiny LastPitchTransformer, in-memory and on-disk metric sinks, and local
//! checkpoint publishing. Scripted criteria pin per-batch losses so averages
//! and failure paths are exact. All use the NdArray backend.

use std::cell::Cell;
use std::path::Path;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, Optimizer};
use burn::prelude::*;
use tempfile::TempDir;

use pitch_data::{collate_interleaved_and_target, BatchSource, PitchBatch, TokenizedSample};
use pitch_model::{LastPitchTransformer, LastPitchTransformerConfig};
use pitch_train::{
    evaluate_epoch, load_checkpoint, train_epoch, CheckpointPublisher, Criterion,
    CrossEntropyCriterion, JsonlScalarWriter, LocalArtifactStore, MemorySink, Phase, TrainError,
    Trainer, TrainingConfig,
};

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<NdArray<f32>>;
type TrainModel = LastPitchTransformer<TestAutodiffBackend>;

const VOCAB: usize = 12;

fn tiny_config() -> LastPitchTransformerConfig {
    LastPitchTransformerConfig::new(VOCAB, 16)
        .with_d_model(8)
        .with_n_heads(2)
        .with_n_layers(1)
        .with_d_ff(16)
        .with_dropout(0.0)
}

fn sample(context: &[i64], target: i64) -> TokenizedSample {
    let mut tokens = vec![1, 4, 9, 5, 11, 2];
    let mut segments = vec![0; tokens.len()];
    tokens.extend_from_slice(context);
    segments.extend(std::iter::repeat(1).take(context.len()));
    TokenizedSample {
        tokens,
        segments,
        target,
    }
}

/// Two batches: the first with two rows, the second with one.
fn batches<B: Backend>(device: &B::Device) -> Vec<PitchBatch<B>> {
    vec![
        collate_interleaved_and_target(&[sample(&[4, 5], 4), sample(&[5, 5, 4], 5)], device)
            .unwrap(),
        collate_interleaved_and_target(&[sample(&[4], 5)], device).unwrap(),
    ]
}

/// Returns the scripted values in order, cycling, regardless of the logits.
/// The loss stays attached to the graph so backward still runs.
struct ScriptedCriterion {
    values: Vec<f64>,
    calls: Cell<usize>,
}

impl ScriptedCriterion {
    fn new(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
            calls: Cell::new(0),
        }
    }
}

impl<B: Backend> Criterion<B> for ScriptedCriterion {
    fn loss(&self, logits: Tensor<B, 2>, _targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        let value = self.values[call % self.values.len()];
        logits.sum().mul_scalar(0.0).add_scalar(value)
    }
}

/// Fails on the given (0-based) pass, yields the wrapped batches otherwise.
struct FailOnPass<B: Backend> {
    inner: Vec<PitchBatch<B>>,
    fail_on: usize,
    passes: Cell<usize>,
}

impl<B: Backend> BatchSource<B> for FailOnPass<B> {
    fn batches(&self) -> Box<dyn Iterator<Item = anyhow::Result<PitchBatch<B>>> + '_> {
        let pass = self.passes.get();
        self.passes.set(pass + 1);
        if pass == self.fail_on {
            Box::new(std::iter::once(Err(anyhow::anyhow!("disk went away"))))
        } else {
            self.inner.batches()
        }
    }

    fn num_batches(&self) -> usize {
        self.inner.len()
    }
}

fn logits_of(model: &TrainModel, batch: &PitchBatch<TestBackend>) -> Tensor<TestBackend, 2> {
    model.valid().forward(batch.input.clone())
}

fn max_abs_diff(a: Tensor<TestBackend, 2>, b: Tensor<TestBackend, 2>) -> f32 {
    (a - b).abs().max().into_scalar().elem()
}

fn root_of(tmp: &TempDir) -> String {
    tmp.path().join("out").to_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Epoch runner
// ---------------------------------------------------------------------------

#[test]
fn test_train_epoch_averages_batch_losses() {
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let mut optimizer = AdamConfig::new().init::<TestAutodiffBackend, TrainModel>();
    let source = batches::<TestAutodiffBackend>(&device);
    let criterion = ScriptedCriterion::new(&[2.0, 4.0]);

    let (_, mean) = train_epoch(model, &mut optimizer, 1e-3, &source, &criterion, &device).unwrap();
    assert!((mean - 3.0).abs() < 1e-6, "expected 3.0, got {mean}");
    assert_eq!(criterion.calls.get(), 2);
}

#[test]
fn test_evaluate_epoch_is_repeatable() {
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let source = batches::<TestBackend>(&device);
    let eval_model = model.valid();

    let first = evaluate_epoch(&eval_model, &source, &CrossEntropyCriterion, &device).unwrap();
    let second = evaluate_epoch(&eval_model, &source, &CrossEntropyCriterion, &device).unwrap();
    assert_eq!(first, second);
    assert!(first.is_finite() && first > 0.0);

    let scripted = ScriptedCriterion::new(&[1.0, 2.0]);
    let mean = evaluate_epoch(&eval_model, &source, &scripted, &device).unwrap();
    assert!((mean - 1.5).abs() < 1e-6);
}

#[test]
fn test_train_epoch_updates_parameters() {
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let sample_batch = batches::<TestBackend>(&device).remove(0);
    let before = logits_of(&model, &sample_batch);

    let mut optimizer = AdamConfig::new().init::<TestAutodiffBackend, TrainModel>();
    let source = batches::<TestAutodiffBackend>(&device);
    let (model, _) =
        train_epoch(model, &mut optimizer, 1e-2, &source, &CrossEntropyCriterion, &device).unwrap();

    let diff = max_abs_diff(before, logits_of(&model, &sample_batch));
    assert!(diff > 1e-6, "training pass left logits unchanged");
}

#[test]
fn test_empty_source_is_error() {
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let empty: Vec<PitchBatch<TestBackend>> = Vec::new();

    let err = evaluate_epoch(&model.valid(), &empty, &CrossEntropyCriterion, &device).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TrainError>(),
        Some(TrainError::EmptySource {
            phase: Phase::Validation
        })
    ));

    let empty: Vec<PitchBatch<TestAutodiffBackend>> = Vec::new();
    let mut optimizer = AdamConfig::new().init::<TestAutodiffBackend, TrainModel>();
    let err = train_epoch(model, &mut optimizer, 1e-3, &empty, &CrossEntropyCriterion, &device)
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<TrainError>(),
        Some(TrainError::EmptySource { phase: Phase::Train })
    ));
}

// ---------------------------------------------------------------------------
// Training loop
// ---------------------------------------------------------------------------

#[test]
fn test_fit_logs_each_epoch_in_order_and_checkpoints() {
    let tmp = TempDir::new().unwrap();
    let root = root_of(&tmp);
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let train = batches::<TestAutodiffBackend>(&device);
    let val = batches::<TestBackend>(&device);

    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let outcome = {
        let mut trainer = Trainer::new(
            TrainingConfig::new().with_num_epochs(3),
            &mut sink,
            CheckpointPublisher::new(&store),
            root.clone(),
        )
        .unwrap();
        trainer
            .fit(model, &train, &val, &CrossEntropyCriterion, &device)
            .unwrap()
    };

    let seen: Vec<(&str, usize)> = sink
        .events()
        .iter()
        .map(|e| (e.tag.as_str(), e.step))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("train/avg_loss", 1),
            ("val/avg_loss", 1),
            ("train/avg_loss", 2),
            ("val/avg_loss", 2),
            ("train/avg_loss", 3),
            ("val/avg_loss", 3),
        ]
    );
    assert_eq!(sink.flush_calls(), 3);
    assert_eq!(sink.flushed_events().len(), 6);

    assert_eq!(outcome.history.len(), 3);
    for (i, report) in outcome.history.iter().enumerate() {
        assert_eq!(report.epoch, i + 1);
        assert_eq!(report.num_epochs, 3);
        assert!(report.elapsed_secs >= 0.0);
    }

    let expected = tmp.path().join("out/final/model.pth");
    assert_eq!(Path::new(&outcome.checkpoint_path), expected);
    assert!(expected.exists(), "checkpoint missing at {}", expected.display());
}

#[test]
fn test_zero_epochs_still_checkpoints_initial_model() {
    let tmp = TempDir::new().unwrap();
    let root = root_of(&tmp);
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let sample_batch = batches::<TestBackend>(&device).remove(0);
    let initial = logits_of(&model, &sample_batch);

    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let outcome = {
        let mut trainer = Trainer::new(
            TrainingConfig::new().with_num_epochs(0),
            &mut sink,
            CheckpointPublisher::new(&store),
            root,
        )
        .unwrap();
        trainer
            .fit(
                model,
                &batches::<TestAutodiffBackend>(&device),
                &batches::<TestBackend>(&device),
                &CrossEntropyCriterion,
                &device,
            )
            .unwrap()
    };

    assert!(sink.events().is_empty());
    assert_eq!(sink.flush_calls(), 0);
    assert!(outcome.history.is_empty());

    let fresh: TrainModel = tiny_config().init(&device);
    let restored =
        load_checkpoint::<TestAutodiffBackend, _>(fresh, Path::new(&outcome.checkpoint_path), &device)
            .unwrap();
    let diff = max_abs_diff(initial, logits_of(&restored, &sample_batch));
    assert!(diff < 1e-6, "restored model differs from initial by {diff}");
}

#[test]
fn test_validation_sees_post_training_model() {
    let tmp = TempDir::new().unwrap();
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let val = batches::<TestBackend>(&device);
    let initial_val =
        evaluate_epoch(&model.valid(), &val, &CrossEntropyCriterion, &device).unwrap();

    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let outcome = {
        let mut trainer = Trainer::new(
            TrainingConfig::new().with_num_epochs(1).with_learning_rate(1e-2),
            &mut sink,
            CheckpointPublisher::new(&store),
            root_of(&tmp),
        )
        .unwrap();
        trainer
            .fit(
                model,
                &batches::<TestAutodiffBackend>(&device),
                &val,
                &CrossEntropyCriterion,
                &device,
            )
            .unwrap()
    };

    let logged = outcome.history[0].val_loss;
    let recomputed =
        evaluate_epoch(&outcome.model.valid(), &val, &CrossEntropyCriterion, &device).unwrap();
    assert!((logged - recomputed).abs() < 1e-6);
    assert!(
        (logged - initial_val).abs() > 1e-6,
        "validation loss should reflect the updated parameters"
    );
    assert!((sink.series("val/avg_loss")[0].value - logged).abs() < 1e-12);
}

#[test]
fn test_optimizer_state_persists_across_epochs() {
    let tmp = TempDir::new().unwrap();
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let sample_batch = batches::<TestBackend>(&device).remove(0);
    let train = batches::<TestAutodiffBackend>(&device);
    let lr = 1e-2;

    // Reference: reset the optimizer before every epoch.
    let mut reset_model = model.clone();
    for _ in 0..2 {
        let mut optimizer = AdamConfig::new().init::<TestAutodiffBackend, TrainModel>();
        let (m, _) =
            train_epoch(reset_model, &mut optimizer, lr, &train, &CrossEntropyCriterion, &device)
                .unwrap();
        reset_model = m;
    }

    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let (outcome, optimizer) = {
        let mut trainer = Trainer::new(
            TrainingConfig::new().with_num_epochs(2).with_learning_rate(lr),
            &mut sink,
            CheckpointPublisher::new(&store),
            root_of(&tmp),
        )
        .unwrap();
        trainer
            .fit_with_optimizer(
                model,
                AdamConfig::new().init::<TestAutodiffBackend, TrainModel>(),
                &train,
                &batches::<TestBackend>(&device),
                &CrossEntropyCriterion,
                &device,
            )
            .unwrap()
    };

    let fresh = AdamConfig::new().init::<TestAutodiffBackend, TrainModel>();
    assert!(fresh.to_record().is_empty());
    assert!(
        !optimizer.to_record().is_empty(),
        "optimizer should carry Adam moments after training"
    );

    let diff = max_abs_diff(logits_of(&reset_model, &sample_batch), logits_of(&outcome.model, &sample_batch));
    assert!(diff > 1e-7, "persistent and reset optimizers gave identical models");
}

#[test]
fn test_non_finite_loss_terminates_run() {
    let tmp = TempDir::new().unwrap();
    let root = root_of(&tmp);
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);

    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let result = {
        let mut trainer = Trainer::new(
            TrainingConfig::new().with_num_epochs(2),
            &mut sink,
            CheckpointPublisher::new(&store),
            root,
        )
        .unwrap();
        trainer.fit(
            model,
            &batches::<TestAutodiffBackend>(&device),
            &batches::<TestBackend>(&device),
            &ScriptedCriterion::new(&[f64::NAN]),
            &device,
        )
    };

    let err = result.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<TrainError>(),
        Some(TrainError::NonFiniteLoss {
            phase: Phase::Train,
            batch: 0,
            ..
        })
    ));
    assert!(sink.events().is_empty());
    assert!(!tmp.path().join("out/final/model.pth").exists());
}

#[test]
fn test_failure_mid_run_keeps_flushed_metrics() {
    let tmp = TempDir::new().unwrap();
    let root = root_of(&tmp);
    let log_dir = tmp.path().join("logs");
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);
    let train = FailOnPass {
        inner: batches::<TestAutodiffBackend>(&device),
        fail_on: 3,
        passes: Cell::new(0),
    };

    let mut sink = JsonlScalarWriter::create(&log_dir).unwrap();
    let log_path = sink.path().to_path_buf();
    let store = LocalArtifactStore;
    let result = {
        let mut trainer = Trainer::new(
            TrainingConfig::new().with_num_epochs(5),
            &mut sink,
            CheckpointPublisher::new(&store),
            root,
        )
        .unwrap();
        trainer.fit(
            model,
            &train,
            &batches::<TestBackend>(&device),
            &CrossEntropyCriterion,
            &device,
        )
    };

    let err = result.err().unwrap();
    assert!(err.to_string().contains("disk went away"), "got {err}");

    let events = JsonlScalarWriter::read_events(&log_path).unwrap();
    assert_eq!(events.len(), 6, "three completed epochs should be durable");
    assert_eq!(events.last().unwrap().step, 3);
    assert!(!tmp.path().join("out/final/model.pth").exists());
}

#[test]
fn test_unwritable_output_root_fails() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let device = Default::default();
    let model: TrainModel = tiny_config().init(&device);

    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let mut trainer = Trainer::new(
        TrainingConfig::new().with_num_epochs(1),
        &mut sink,
        CheckpointPublisher::new(&store),
        blocker.to_str().unwrap(),
    )
    .unwrap();
    let result = trainer.fit(
        model,
        &batches::<TestAutodiffBackend>(&device),
        &batches::<TestBackend>(&device),
        &CrossEntropyCriterion,
        &device,
    );
    assert!(result.is_err());
}

#[test]
fn test_invalid_learning_rate_rejected_before_training() {
    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let result = Trainer::new(
        TrainingConfig::new().with_learning_rate(0.0),
        &mut sink,
        CheckpointPublisher::new(&store),
        "out",
    );
    assert!(matches!(result, Err(TrainError::InvalidLearningRate(_))));
}

#[test]
fn test_empty_output_root_rejected_before_training() {
    let mut sink = MemorySink::new();
    let store = LocalArtifactStore;
    let result = Trainer::new(
        TrainingConfig::new().with_num_epochs(3),
        &mut sink,
        CheckpointPublisher::new(&store),
        "",
    );
    assert!(
        matches!(result, Err(TrainError::InvalidOutputRoot { .. })),
        "empty output root must fail at construction"
    );
    drop(result);
    assert!(sink.events().is_empty(), "no epoch may be logged");
}

//! End-to-end training pipeline behind the `pitcharsenal` binary.

use std::path::PathBuf;
use std::time::Instant;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use pitch_data::tokenizer::DEFAULT_MAX_PITCH_COUNT_SEQ_LEN;
use pitch_data::{
    ArsenalSequenceTokenizer, PitchArsenalLookupTable, PitchSequenceDataset, SequenceLoader,
};
use pitch_train::{
    checkpoint_path, store_for, CheckpointPublisher, CrossEntropyCriterion, JsonlScalarWriter,
    Trainer, TrainingConfig,
};

use crate::config::{build_model_config, load_train_toml, resolve_seed, TrainToml};

/// Seed used for training-set shuffling when neither TOML nor CLI sets one.
pub const DEFAULT_SHUFFLE_SEED: u64 = 42;

/// File the resolved model hyperparameters are written to, under the
/// logging directory, so the checkpoint can be reloaded later.
pub const MODEL_CONFIG_FILE: &str = "model_config.json";

/// Arguments for a training run.
#[derive(Debug, Clone)]
pub struct TrainArgs {
    /// Pitch sequence CSV used for training.
    pub input_train_path: PathBuf,
    /// Pitch sequence CSV used for validation.
    pub input_validation_path: PathBuf,
    /// Local directory or `gs://` URI receiving `final/model.pth`.
    pub output_directory: String,
    /// Directory receiving `scalars.jsonl`.
    pub logging_directory: PathBuf,
    /// Long-format `pitcher_id,pitch_type` CSV.
    pub arsenal_lookup_table_path: PathBuf,
    pub num_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Optional TOML with `[model]` and `[data]` overrides.
    pub config: Option<PathBuf>,
    /// CLI shuffle seed; beats the TOML value.
    pub seed: Option<u64>,
}

/// Read inputs, train on backend `B`, publish the final model.
///
/// Every input error (missing file, malformed CSV, unknown pitcher, bad
/// hyperparameters, unusable output root) surfaces before the first epoch.
/// Output root problems surface before any input is read.
pub fn run_train<B: AutodiffBackend>(args: &TrainArgs, device: &B::Device) -> anyhow::Result<()> {
    let start = Instant::now();

    // 1. Config and output store
    let toml = match &args.config {
        Some(path) => load_train_toml(path)?,
        None => TrainToml::default(),
    };
    let training = TrainingConfig::new()
        .with_num_epochs(args.num_epochs)
        .with_learning_rate(args.learning_rate);
    training.validate()?;
    checkpoint_path(&args.output_directory)?;
    let store = store_for(&args.output_directory)?;

    // 2. Arsenal table and tokenizer
    tracing::info!(path = %args.arsenal_lookup_table_path.display(), "Reading arsenal lookup table");
    let table = PitchArsenalLookupTable::from_csv(&args.arsenal_lookup_table_path)?;
    let max_seq_len = toml
        .data
        .max_pitch_count_seq_len
        .unwrap_or(DEFAULT_MAX_PITCH_COUNT_SEQ_LEN);
    let tokenizer = ArsenalSequenceTokenizer::new(&table, max_seq_len);
    tracing::info!(
        pitchers = table.num_pitchers(),
        pitch_types = table.num_pitch_types(),
        vocab_size = tokenizer.vocab_size(),
        max_input_len = tokenizer.max_input_len(),
        "Built tokenizer"
    );

    // 3. Datasets and loaders
    tracing::info!(path = %args.input_train_path.display(), "Reading training data");
    let train_set = PitchSequenceDataset::from_csv(&args.input_train_path, &tokenizer, &table)?;
    tracing::info!(path = %args.input_validation_path.display(), "Reading validation data");
    let val_set = PitchSequenceDataset::from_csv(&args.input_validation_path, &tokenizer, &table)?;
    tracing::info!(train = train_set.len(), validation = val_set.len(), "Loaded datasets");

    let seed = resolve_seed(&toml.data, args.seed, DEFAULT_SHUFFLE_SEED);
    let train_loader =
        SequenceLoader::<B>::new(train_set, args.batch_size, device)?.with_shuffle(seed);
    let val_loader = SequenceLoader::<B::InnerBackend>::new(val_set, args.batch_size, device)?;

    // 4. Model
    let model_config =
        build_model_config(tokenizer.vocab_size(), tokenizer.max_input_len(), &toml.model);
    model_config.validate()?;
    let model = model_config.init::<B>(device);

    // 5. Outputs
    let mut sink = JsonlScalarWriter::create(&args.logging_directory)?;
    let config_path = args.logging_directory.join(MODEL_CONFIG_FILE);
    model_config
        .save(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", config_path.display()))?;

    // 6. Train
    let mut trainer = Trainer::new(
        training,
        &mut sink,
        CheckpointPublisher::new(store.as_ref()),
        args.output_directory.clone(),
    )?;
    let outcome = trainer.fit(model, &train_loader, &val_loader, &CrossEntropyCriterion, device)?;

    tracing::info!(
        epochs = outcome.history.len(),
        checkpoint = %outcome.checkpoint_path,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Training finished"
    );
    Ok(())
}

//! TOML config loading for the trainer CLI.
//!
//! Deserializes `configs/train.toml`, which has optional `[model]` and
//! `[data]` sections, then merges it onto the built-in defaults.

use std::path::Path;

use pitch_model::LastPitchTransformerConfig;
use serde::Deserialize;

/// Top-level structure matching `configs/train.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct TrainToml {
    /// Transformer hyperparameters.
    #[serde(default)]
    pub model: ModelOverrides,
    /// Tokenization and loading parameters.
    #[serde(default)]
    pub data: DataOverrides,
}

/// Optional overrides for `LastPitchTransformerConfig` fields.
///
/// `vocab_size` and `max_len` are derived from the arsenal table and the
/// tokenizer, so they cannot be set here.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverrides {
    pub d_model: Option<usize>,
    pub n_heads: Option<usize>,
    pub n_layers: Option<usize>,
    pub d_ff: Option<usize>,
    pub dropout: Option<f64>,
}

/// Optional data pipeline overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataOverrides {
    /// Most recent pitches kept as context per sample.
    pub max_pitch_count_seq_len: Option<usize>,
    /// Seed for per-epoch shuffling of the training set.
    pub shuffle_seed: Option<u64>,
}

/// Load and deserialize a `TrainToml` from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    let config: TrainToml = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded train config");
    Ok(config)
}

/// Apply TOML overrides on top of the model defaults.
pub fn build_model_config(
    vocab_size: usize,
    max_len: usize,
    overrides: &ModelOverrides,
) -> LastPitchTransformerConfig {
    let mut config = LastPitchTransformerConfig::new(vocab_size, max_len);
    if let Some(n) = overrides.d_model {
        config.d_model = n;
    }
    if let Some(n) = overrides.n_heads {
        config.n_heads = n;
    }
    if let Some(n) = overrides.n_layers {
        config.n_layers = n;
    }
    if let Some(n) = overrides.d_ff {
        config.d_ff = n;
    }
    if let Some(p) = overrides.dropout {
        config.dropout = p;
    }
    config
}

/// Resolve the shuffle seed. Priority: default < TOML < CLI `--seed`.
pub fn resolve_seed(overrides: &DataOverrides, cli_seed: Option<u64>, default: u64) -> u64 {
    cli_seed.or(overrides.shuffle_seed).unwrap_or(default)
}

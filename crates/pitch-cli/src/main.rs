mod config;
mod device;
mod pipeline;

use std::path::PathBuf;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::backend::Autodiff;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use device::{DevicePreference, ResolvedDevice};
use pipeline::TrainArgs;

/// pitcharsenal: train a next-pitch sequence model from pitcher arsenals.
#[derive(Parser)]
#[command(name = "pitcharsenal", version, about)]
struct Cli {
    /// Pitch sequence CSV used for training.
    #[arg(long = "input_train_path")]
    input_train_path: PathBuf,
    /// Pitch sequence CSV used for validation.
    #[arg(long = "input_validation_path")]
    input_validation_path: PathBuf,
    /// Local directory or gs:// URI for the final checkpoint.
    #[arg(long = "output_directory")]
    output_directory: String,
    /// Directory for the per-epoch scalar log.
    #[arg(long = "logging_directory")]
    logging_directory: PathBuf,
    /// Long-format CSV of (pitcher_id, pitch_type) rows.
    #[arg(long = "arsenal_lookup_table_path")]
    arsenal_lookup_table_path: PathBuf,
    /// Number of training epochs.
    #[arg(long = "num_epochs", default_value_t = 10)]
    num_epochs: usize,
    /// Samples per batch.
    #[arg(long = "batch_size", default_value_t = 32)]
    batch_size: usize,
    /// Adam learning rate.
    #[arg(long = "learning_rate", default_value_t = 0.001)]
    learning_rate: f64,
    /// Path to a train config TOML file with [model] and [data] overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Compute device. Falls back to CPU when no GPU adapter is usable.
    #[arg(long, value_enum, default_value_t = DevicePreference::Auto)]
    device: DevicePreference,
    /// Shuffle seed for the training set.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let args = TrainArgs {
        input_train_path: cli.input_train_path,
        input_validation_path: cli.input_validation_path,
        output_directory: cli.output_directory,
        logging_directory: cli.logging_directory,
        arsenal_lookup_table_path: cli.arsenal_lookup_table_path,
        num_epochs: cli.num_epochs,
        batch_size: cli.batch_size,
        learning_rate: cli.learning_rate,
        config: cli.config,
        seed: cli.seed,
    };

    match device::resolve(cli.device) {
        ResolvedDevice::Cpu => {
            tracing::info!("Using NdArray CPU backend");
            pipeline::run_train::<Autodiff<NdArray<f32>>>(&args, &NdArrayDevice::Cpu)?;
        }
        #[cfg(feature = "wgpu")]
        ResolvedDevice::Gpu => {
            use burn::backend::wgpu::{Wgpu, WgpuDevice};
            tracing::info!("Using wgpu backend");
            pipeline::run_train::<Autodiff<Wgpu>>(&args, &WgpuDevice::default())?;
        }
    }

    println!(
        "Done training model. Output can be found at {}",
        args.output_directory
    );
    Ok(())
}

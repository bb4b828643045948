//! Training loop for the next-pitch sequence model.
//!
//! - [`epoch`]: one train or eval pass returning the mean batch loss
//! - [`trainer`]: the epoch loop with a persistent Adam optimizer
//! - [`sink`]: per-epoch scalar metrics
//! - [`checkpoint`] and [`store`]: publishing the final model locally or to GCS

pub mod checkpoint;
pub mod epoch;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod sink;
pub mod store;
pub mod trainer;

pub use checkpoint::{checkpoint_path, load_checkpoint, CheckpointPublisher, FINAL_DIR, MODEL_FILE};
pub use epoch::{evaluate_epoch, train_epoch};
pub use error::TrainError;
pub use loss::{Criterion, CrossEntropyCriterion};
pub use metrics::{EpochReport, LossAccumulator, Phase};
pub use sink::{JsonlScalarWriter, MemorySink, ScalarEvent, ScalarSink};
pub use store::{store_for, ArtifactStore, GcsArtifactStore, LocalArtifactStore, StoreError};
pub use trainer::{FitOutcome, Trainer, TrainingConfig};

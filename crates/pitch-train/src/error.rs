use crate::metrics::Phase;
use crate::store::StoreError;

/// Errors raised by the epoch runner and training loop itself.
///
/// Collaborator failures (data, model serialization, storage) keep their own
/// types and travel through `anyhow` alongside these.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    /// A batch source produced nothing, so there is no average to report.
    #[error("{phase} batch source yielded no batches")]
    EmptySource { phase: Phase },

    /// A batch loss was NaN or infinite.
    #[error("non-finite {phase} loss {value} at batch {batch}")]
    NonFiniteLoss { phase: Phase, batch: usize, value: f64 },

    /// Learning rate was zero, negative, or not finite.
    #[error("learning rate must be positive and finite, got {0}")]
    InvalidLearningRate(f64),

    /// The output root cannot hold a checkpoint.
    #[error("invalid output root '{root}': {source}")]
    InvalidOutputRoot {
        root: String,
        #[source]
        source: StoreError,
    },
}

//! Row types read from CSV input and the data-layer error enum.

use serde::Deserialize;
use std::path::PathBuf;

/// Errors that can occur while loading or tokenizing pitch data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// CSV could not be opened or parsed.
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A pitch sequence references a pitcher with no arsenal entry.
    #[error("pitcher {0} has no entry in the arsenal lookup table")]
    UnknownPitcher(String),

    /// The arsenal lookup table contained no rows.
    #[error("arsenal lookup table {0} is empty")]
    EmptyArsenalTable(PathBuf),

    /// A file produced no usable (input, target) samples.
    #[error("no usable pitch sequences in {0}")]
    EmptyDataset(PathBuf),

    /// Tensor fields of a batch disagree on shape.
    #[error("shape mismatch in {field}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        field: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Collate was called with no samples.
    #[error("cannot collate an empty batch")]
    EmptyBatch,

    /// Batch size of zero requested for a loader.
    #[error("batch size must be positive")]
    ZeroBatchSize,
}

/// One row of the arsenal lookup table (long format).
#[derive(Debug, Clone, Deserialize)]
pub struct ArsenalRow {
    /// Pitcher identifier, e.g. an MLBAM id.
    pub pitcher_id: String,
    /// Pitch-type code, e.g. `FF`, `SL`.
    pub pitch_type: String,
}

/// One row of a train or validation pitch sequence file.
#[derive(Debug, Clone, Deserialize)]
pub struct PitchSequenceRow {
    /// Pitcher who threw the sequence.
    pub pitcher_id: String,
    /// `|`-separated pitch-type codes in throw order.
    pub pitch_sequence: String,
}

impl PitchSequenceRow {
    /// Split the raw sequence column into trimmed, non-empty pitch codes.
    pub fn pitches(&self) -> Vec<&str> {
        self.pitch_sequence
            .split('|')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Read every row of a CSV file into `T`, ignoring unknown columns.
pub(crate) fn read_csv_rows<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<Vec<T>, DataError> {
    let wrap = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(wrap)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(wrap)?;

    tracing::debug!(count = rows.len(), path = %path.display(), "Read CSV rows");
    Ok(rows)
}

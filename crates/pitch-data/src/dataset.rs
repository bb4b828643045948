//! Tokenized pitch sequence dataset.

use std::path::Path;

use crate::arsenal::PitchArsenalLookupTable;
use crate::tokenizer::{ArsenalSequenceTokenizer, TokenizedSample};
use crate::types::{read_csv_rows, DataError, PitchSequenceRow};

/// In-memory collection of (input, target) samples ready for batching.
#[derive(Debug, Clone, Default)]
pub struct PitchSequenceDataset {
    samples: Vec<TokenizedSample>,
}

impl PitchSequenceDataset {
    /// Read a pitch sequence CSV and tokenize every usable row.
    ///
    /// Rows with fewer than two pitches are skipped. A row whose pitcher has
    /// no arsenal entry is an error, as is a file with no usable rows.
    pub fn from_csv(
        path: &Path,
        tokenizer: &ArsenalSequenceTokenizer,
        arsenal_table: &PitchArsenalLookupTable,
    ) -> Result<Self, DataError> {
        let rows: Vec<PitchSequenceRow> = read_csv_rows(path)?;
        let total = rows.len();
        let dataset = Self::from_rows(rows, tokenizer, arsenal_table)?;

        let skipped = total - dataset.len();
        if skipped > 0 {
            tracing::warn!(
                skipped,
                total,
                path = %path.display(),
                "Skipped rows with fewer than two pitches"
            );
        }
        if dataset.is_empty() {
            return Err(DataError::EmptyDataset(path.to_path_buf()));
        }
        tracing::info!(samples = dataset.len(), path = %path.display(), "Built pitch sequence dataset");
        Ok(dataset)
    }

    /// Tokenize already-parsed rows.
    pub fn from_rows(
        rows: impl IntoIterator<Item = PitchSequenceRow>,
        tokenizer: &ArsenalSequenceTokenizer,
        arsenal_table: &PitchArsenalLookupTable,
    ) -> Result<Self, DataError> {
        let mut samples = Vec::new();
        for row in rows {
            let arsenal = arsenal_table
                .arsenal(&row.pitcher_id)
                .ok_or_else(|| DataError::UnknownPitcher(row.pitcher_id.clone()))?;
            if let Some(sample) = tokenizer.encode(arsenal, &row.pitches()) {
                samples.push(sample);
            }
        }
        Ok(Self { samples })
    }

    pub fn from_samples(samples: Vec<TokenizedSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[TokenizedSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<TokenizedSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

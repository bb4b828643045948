//! Per-pitcher arsenal lookup built from the long-format arsenal CSV.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::types::{read_csv_rows, ArsenalRow, DataError};

/// Maps each pitcher to the ordered list of pitch types they throw.
///
/// Arsenal order is the order of first appearance in the source table, so a
/// pitch's slot index is stable across runs for the same input file.
#[derive(Debug, Clone, Default)]
pub struct PitchArsenalLookupTable {
    arsenals: HashMap<String, Vec<String>>,
    pitch_types: BTreeSet<String>,
    max_arsenal_size: usize,
}

impl PitchArsenalLookupTable {
    /// Load the table from a CSV with `pitcher_id` and `pitch_type` columns.
    pub fn from_csv(path: &Path) -> Result<Self, DataError> {
        let rows: Vec<ArsenalRow> = read_csv_rows(path)?;
        if rows.is_empty() {
            return Err(DataError::EmptyArsenalTable(path.to_path_buf()));
        }
        let table = Self::from_rows(rows);
        tracing::info!(
            pitchers = table.num_pitchers(),
            pitch_types = table.pitch_types.len(),
            max_arsenal_size = table.max_arsenal_size,
            path = %path.display(),
            "Loaded pitcher arsenal table"
        );
        Ok(table)
    }

    /// Build the table from already-parsed rows. Duplicate rows are ignored.
    pub fn from_rows(rows: impl IntoIterator<Item = ArsenalRow>) -> Self {
        let mut arsenals: HashMap<String, Vec<String>> = HashMap::new();
        let mut pitch_types = BTreeSet::new();

        for row in rows {
            let arsenal = arsenals.entry(row.pitcher_id).or_default();
            if !arsenal.contains(&row.pitch_type) {
                arsenal.push(row.pitch_type.clone());
            }
            pitch_types.insert(row.pitch_type);
        }

        let max_arsenal_size = arsenals.values().map(Vec::len).max().unwrap_or(0);
        Self {
            arsenals,
            pitch_types,
            max_arsenal_size,
        }
    }

    /// Arsenal of a pitcher, in slot order.
    pub fn arsenal(&self, pitcher_id: &str) -> Option<&[String]> {
        self.arsenals.get(pitcher_id).map(Vec::as_slice)
    }

    /// Slot index of `pitch_type` within the pitcher's arsenal.
    pub fn slot_of(&self, pitcher_id: &str, pitch_type: &str) -> Option<usize> {
        self.arsenal(pitcher_id)?
            .iter()
            .position(|p| p == pitch_type)
    }

    /// Largest arsenal across all pitchers.
    pub fn max_arsenal_size(&self) -> usize {
        self.max_arsenal_size
    }

    /// Every distinct pitch type in the table, sorted by code.
    pub fn pitch_types(&self) -> impl Iterator<Item = &str> {
        self.pitch_types.iter().map(String::as_str)
    }

    pub fn num_pitch_types(&self) -> usize {
        self.pitch_types.len()
    }

    pub fn num_pitchers(&self) -> usize {
        self.arsenals.len()
    }
}

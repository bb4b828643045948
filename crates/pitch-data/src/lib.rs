//! Pitch sequence data pipeline.
//!
//! Reads pitcher arsenals and pitch sequences from CSV, tokenizes them into
//! a pitcher-relative vocabulary, and collates variable-length samples into
//! burn tensor batches for the training loop.

pub mod arsenal;
pub mod batch;
pub mod dataset;
pub mod loader;
pub mod tokenizer;
pub mod types;

pub use arsenal::PitchArsenalLookupTable;
pub use batch::{collate_interleaved_and_target, PitchBatch, PitchSequenceInput};
pub use dataset::PitchSequenceDataset;
pub use loader::{BatchSource, SequenceLoader};
pub use tokenizer::{ArsenalSequenceTokenizer, TokenizedSample};
pub use types::{ArsenalRow, DataError, PitchSequenceRow};

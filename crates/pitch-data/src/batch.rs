//! Batched model input and the collate function that builds it.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::tokenizer::{TokenizedSample, PAD_TOKEN, SEQUENCE_SEGMENT};
use crate::types::DataError;

/// Structured model input for an interleaved arsenal/pitch sequence batch.
///
/// Every field is required and shapes are checked once in [`Self::new`], so
/// a model receiving this type never has to re-validate its arguments.
#[derive(Debug, Clone)]
pub struct PitchSequenceInput<B: Backend> {
    /// `(batch, len)` interleaved token ids, right-padded with `PAD`.
    tokens: Tensor<B, 2, Int>,
    /// `(batch, len)` segment ids (arsenal vs. sequence section).
    segments: Tensor<B, 2, Int>,
    /// `(batch, len)` true where `tokens` is padding.
    padding_mask: Tensor<B, 2, Bool>,
    /// `(batch,)` position of the last real token in each row.
    last_index: Tensor<B, 1, Int>,
}

impl<B: Backend> PitchSequenceInput<B> {
    /// Assemble an input, deriving the padding mask from `tokens`.
    pub fn new(
        tokens: Tensor<B, 2, Int>,
        segments: Tensor<B, 2, Int>,
        last_index: Tensor<B, 1, Int>,
    ) -> Result<Self, DataError> {
        let dims = tokens.dims();
        if segments.dims() != dims {
            return Err(DataError::ShapeMismatch {
                field: "segments",
                expected: dims.to_vec(),
                actual: segments.dims().to_vec(),
            });
        }
        if last_index.dims() != [dims[0]] {
            return Err(DataError::ShapeMismatch {
                field: "last_index",
                expected: vec![dims[0]],
                actual: last_index.dims().to_vec(),
            });
        }
        let padding_mask = tokens.clone().equal_elem(PAD_TOKEN);
        Ok(Self {
            tokens,
            segments,
            padding_mask,
            last_index,
        })
    }

    pub fn tokens(&self) -> &Tensor<B, 2, Int> {
        &self.tokens
    }

    pub fn segments(&self) -> &Tensor<B, 2, Int> {
        &self.segments
    }

    pub fn padding_mask(&self) -> &Tensor<B, 2, Bool> {
        &self.padding_mask
    }

    pub fn last_index(&self) -> &Tensor<B, 1, Int> {
        &self.last_index
    }

    pub fn batch_size(&self) -> usize {
        self.tokens.dims()[0]
    }

    pub fn seq_len(&self) -> usize {
        self.tokens.dims()[1]
    }

    /// Move every field to `device`.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            tokens: self.tokens.to_device(device),
            segments: self.segments.to_device(device),
            padding_mask: self.padding_mask.to_device(device),
            last_index: self.last_index.to_device(device),
        }
    }
}

/// One training or validation batch: structured input plus class targets.
#[derive(Debug, Clone)]
pub struct PitchBatch<B: Backend> {
    pub input: PitchSequenceInput<B>,
    /// `(batch,)` token id of the pitch to predict per row.
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> PitchBatch<B> {
    pub fn new(input: PitchSequenceInput<B>, targets: Tensor<B, 1, Int>) -> Result<Self, DataError> {
        let batch = input.batch_size();
        if targets.dims() != [batch] {
            return Err(DataError::ShapeMismatch {
                field: "targets",
                expected: vec![batch],
                actual: targets.dims().to_vec(),
            });
        }
        Ok(Self { input, targets })
    }

    pub fn len(&self) -> usize {
        self.input.batch_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move input and targets to `device`.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            input: self.input.to_device(device),
            targets: self.targets.to_device(device),
        }
    }
}

/// Merge variable-length samples into one right-padded batch.
///
/// Rows are padded to the longest sample in the batch, not to the global
/// maximum, so short batches stay cheap.
pub fn collate_interleaved_and_target<B: Backend>(
    samples: &[TokenizedSample],
    device: &B::Device,
) -> Result<PitchBatch<B>, DataError> {
    let batch = samples.len();
    let max_len = samples.iter().map(TokenizedSample::len).max().unwrap_or(0);
    if batch == 0 || max_len == 0 {
        return Err(DataError::EmptyBatch);
    }

    let mut tokens = vec![PAD_TOKEN; batch * max_len];
    let mut segments = vec![SEQUENCE_SEGMENT; batch * max_len];
    let mut last_index = Vec::with_capacity(batch);
    let mut targets = Vec::with_capacity(batch);

    for (row, sample) in samples.iter().enumerate() {
        let offset = row * max_len;
        tokens[offset..offset + sample.len()].copy_from_slice(&sample.tokens);
        segments[offset..offset + sample.len()].copy_from_slice(&sample.segments);
        last_index.push(sample.len() as i64 - 1);
        targets.push(sample.target);
    }

    let input = PitchSequenceInput::new(
        Tensor::from_data(TensorData::new(tokens, [batch, max_len]), device),
        Tensor::from_data(TensorData::new(segments, [batch, max_len]), device),
        Tensor::from_data(TensorData::new(last_index, [batch]), device),
    )?;
    PitchBatch::new(input, Tensor::from_data(TensorData::new(targets, [batch]), device))
}

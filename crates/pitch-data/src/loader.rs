//! Re-iterable batch sources consumed by the training loop.

use std::sync::atomic::{AtomicU64, Ordering};

use burn::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::batch::{collate_interleaved_and_target, PitchBatch};
use crate::dataset::PitchSequenceDataset;
use crate::tokenizer::TokenizedSample;
use crate::types::DataError;

/// A finite sequence of batches that can be walked once per epoch.
///
/// Each call to [`batches`](Self::batches) starts a fresh pass. Items are
/// fallible so lazily-loading sources can surface I/O errors mid-pass.
pub trait BatchSource<B: Backend> {
    fn batches(&self) -> Box<dyn Iterator<Item = anyhow::Result<PitchBatch<B>>> + '_>;

    /// Number of batches one pass yields.
    fn num_batches(&self) -> usize;
}

/// Pre-collated batches, yielded in order on every pass.
impl<B: Backend> BatchSource<B> for Vec<PitchBatch<B>> {
    fn batches(&self) -> Box<dyn Iterator<Item = anyhow::Result<PitchBatch<B>>> + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }

    fn num_batches(&self) -> usize {
        self.len()
    }
}

/// Batches a tokenized dataset on demand, optionally reshuffling per pass.
pub struct SequenceLoader<B: Backend> {
    samples: Vec<TokenizedSample>,
    batch_size: usize,
    shuffle_seed: Option<u64>,
    passes: AtomicU64,
    device: B::Device,
}

impl<B: Backend> SequenceLoader<B> {
    pub fn new(
        dataset: PitchSequenceDataset,
        batch_size: usize,
        device: &B::Device,
    ) -> Result<Self, DataError> {
        if batch_size == 0 {
            return Err(DataError::ZeroBatchSize);
        }
        Ok(Self {
            samples: dataset.into_samples(),
            batch_size,
            shuffle_seed: None,
            passes: AtomicU64::new(0),
            device: device.clone(),
        })
    }

    /// Shuffle sample order on every pass. Pass `k` uses seed `seed + k`, so
    /// a run is reproducible while epochs still see different orders.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn pass_order(&self) -> Vec<usize> {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed);
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        if let Some(seed) = self.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(pass));
            order.shuffle(&mut rng);
        }
        order
    }
}

impl<B: Backend> BatchSource<B> for SequenceLoader<B> {
    fn batches(&self) -> Box<dyn Iterator<Item = anyhow::Result<PitchBatch<B>>> + '_> {
        let chunks: Vec<Vec<usize>> = self
            .pass_order()
            .chunks(self.batch_size)
            .map(<[usize]>::to_vec)
            .collect();

        Box::new(chunks.into_iter().map(move |indices| {
            let items: Vec<TokenizedSample> = indices
                .iter()
                .map(|&i| self.samples[i].clone())
                .collect();
            Ok(collate_interleaved_and_target(&items, &self.device)?)
        }))
    }

    fn num_batches(&self) -> usize {
        self.samples.len().div_ceil(self.batch_size)
    }
}

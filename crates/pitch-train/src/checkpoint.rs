//! Final-model checkpoint publishing.

use std::path::Path;

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};

use crate::store::{join_paths, ArtifactStore};

/// Subdirectory of the output root holding the final checkpoint.
pub const FINAL_DIR: &str = "final";
/// File name of the serialized model state.
pub const MODEL_FILE: &str = "model.pth";

/// Location of the final checkpoint under `root`: `<root>/final/model.pth`.
pub fn checkpoint_path(root: &str) -> anyhow::Result<String> {
    Ok(join_paths(root, &[FINAL_DIR, MODEL_FILE])?)
}

/// Serializes model state and writes it through an [`ArtifactStore`].
pub struct CheckpointPublisher<'a> {
    store: &'a dyn ArtifactStore,
}

impl<'a> CheckpointPublisher<'a> {
    pub fn new(store: &'a dyn ArtifactStore) -> Self {
        Self { store }
    }

    /// Write the model's parameters to `<root>/final/model.pth`.
    ///
    /// Returns the resolved destination. Publishing the same model twice
    /// overwrites the artifact with identical bytes.
    pub fn publish<B: Backend, M: Module<B>>(&self, model: &M, root: &str) -> anyhow::Result<String> {
        let destination = checkpoint_path(root)?;
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();
        let bytes = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| anyhow::anyhow!("Failed to serialize model: {e}"))?;

        let resolved = self.store.put(&destination, &bytes)?;
        tracing::info!(path = %resolved, bytes = bytes.len(), "Published final checkpoint");
        Ok(resolved)
    }
}

/// Load weights from a local checkpoint into `model`.
///
/// `model` supplies the architecture; its parameters are replaced.
pub fn load_checkpoint<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> anyhow::Result<M> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read checkpoint {}: {e}", path.display()))?;
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();
    let record = Recorder::<B>::load(&recorder, bytes, device)
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded checkpoint");
    Ok(model.load_record(record))
}

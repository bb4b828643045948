//! Per-epoch loss accumulation and reporting.

use std::fmt;

use serde::Serialize;

use crate::error::TrainError;

/// Which half of an epoch a loss belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Validation,
}

impl Phase {
    /// Tag under which the phase's epoch average is written to the metrics sink.
    pub fn metric_tag(self) -> &'static str {
        match self {
            Self::Train => "train/avg_loss",
            Self::Validation => "val/avg_loss",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Running sum of batch losses over one pass.
#[derive(Debug, Clone)]
pub struct LossAccumulator {
    phase: Phase,
    sum: f64,
    batches: usize,
}

impl LossAccumulator {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            sum: 0.0,
            batches: 0,
        }
    }

    /// Add one batch loss. Non-finite values are rejected.
    pub fn push(&mut self, value: f64) -> Result<(), TrainError> {
        if !value.is_finite() {
            return Err(TrainError::NonFiniteLoss {
                phase: self.phase,
                batch: self.batches,
                value,
            });
        }
        self.sum += value;
        self.batches += 1;
        Ok(())
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Arithmetic mean of every pushed loss.
    pub fn mean(&self) -> Result<f64, TrainError> {
        if self.batches == 0 {
            return Err(TrainError::EmptySource { phase: self.phase });
        }
        Ok(self.sum / self.batches as f64)
    }
}

/// Summary of one completed epoch.
#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub num_epochs: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    /// Wall-clock seconds for the train and validation passes together.
    pub elapsed_secs: f64,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {}/{}, Train Loss: {:.4}, Val Loss: {:.4}. Epoch Time {:.2}sec",
            self.epoch, self.num_epochs, self.train_loss, self.val_loss, self.elapsed_secs
        )
    }
}

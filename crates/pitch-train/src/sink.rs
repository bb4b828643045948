//! Metrics sinks for per-epoch scalar logging.
//!
//! The training loop receives its sink as an argument; there is no global
//! writer.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Append-only destination for tagged scalar metrics.
pub trait ScalarSink {
    /// Record `value` under `tag` at `step` (the epoch index).
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> anyhow::Result<()>;

    /// Make every previously added scalar durable.
    fn flush(&mut self) -> anyhow::Result<()>;
}

/// One logged scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub tag: String,
    pub step: usize,
    pub value: f64,
    /// Seconds since the Unix epoch when the scalar was added.
    pub wall_time: f64,
}

impl ScalarEvent {
    fn now(tag: &str, value: f64, step: usize) -> Self {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            tag: tag.to_string(),
            step,
            value,
            wall_time,
        }
    }
}

/// Writes scalars as JSON lines to `<logging_dir>/scalars.jsonl`.
///
/// Lines are buffered; only [`ScalarSink::flush`] guarantees they reach disk.
/// Re-opening an existing log appends to it.
pub struct JsonlScalarWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlScalarWriter {
    pub const FILE_NAME: &'static str = "scalars.jsonl";

    /// Open (creating if needed) the scalar log under `logging_dir`.
    pub fn create(logging_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logging_dir).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create logging directory {}: {e}",
                logging_dir.display()
            )
        })?;
        let path = logging_dir.join(Self::FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;

        tracing::info!(path = %path.display(), "Writing scalar metrics");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event from a scalar log file.
    pub fn read_events(path: &Path) -> anyhow::Result<Vec<ScalarEvent>> {
        let file = File::open(path)?;
        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }
}

impl ScalarSink for JsonlScalarWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, &ScalarEvent::now(tag, value, step))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Keeps scalars in memory and tracks which ones were flushed.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Vec<ScalarEvent>,
    flushed: usize,
    flush_calls: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ScalarEvent] {
        &self.events
    }

    /// Events that were followed by a flush.
    pub fn flushed_events(&self) -> &[ScalarEvent] {
        &self.events[..self.flushed]
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls
    }

    /// Events with the given tag, in insertion order.
    pub fn series(&self, tag: &str) -> Vec<&ScalarEvent> {
        self.events.iter().filter(|e| e.tag == tag).collect()
    }
}

impl ScalarSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> anyhow::Result<()> {
        self.events.push(ScalarEvent::now(tag, value, step));
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.flushed = self.events.len();
        self.flush_calls += 1;
        Ok(())
    }
}

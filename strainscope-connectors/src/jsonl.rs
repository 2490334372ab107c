//! JSON-lines file sink
//!
//! Appends one JSON object per reading. Each batch is encoded up front, then
//! written with a single call and synced before `persist` returns, so a
//! successful return means the batch is on disk.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use strainscope_core::{DurableSink, Reading, SinkError};

use crate::{ConnectionStats, ConnectorError, StatsCell};

pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
    stats: StatsCell,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it and its parent directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("json-lines sink writing to {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
            stats: StatsCell::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    fn write_batch(&self, batch: &[Reading]) -> Result<usize, ConnectorError> {
        let mut encoded = Vec::with_capacity(batch.len() * 160);
        for reading in batch {
            serde_json::to_writer(&mut encoded, reading)?;
            encoded.push(b'\n');
        }

        let mut file = self.file.lock();
        file.write_all(&encoded)?;
        file.sync_data()?;
        Ok(encoded.len())
    }
}

impl DurableSink for JsonLinesSink {
    fn persist(&self, batch: &[Reading], _timeout: Duration) -> Result<(), SinkError> {
        match self.write_batch(batch) {
            Ok(bytes) => {
                self.stats.record_success(batch.len(), bytes);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

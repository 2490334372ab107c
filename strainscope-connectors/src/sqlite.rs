//! SQLite sink
//!
//! Persists batches into the `strain_readings` table, one transaction per
//! batch. Timestamps are stored in milliseconds, as they arrive. The flush
//! timeout becomes the connection's busy timeout, so a locked database fails
//! the batch instead of stalling the flush worker.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use strainscope_core::{DurableSink, Reading, SinkError};

use crate::{ConnectionStats, ConnectorError, StatsCell};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS strain_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        strain_value REAL NOT NULL,
        raw_adc_value INTEGER NOT NULL,
        sensor_id TEXT NOT NULL,
        battery_level INTEGER NOT NULL,
        temperature REAL NOT NULL,
        checksum TEXT,
        created_at INTEGER DEFAULT (strftime('%s','now'))
    );
    CREATE INDEX IF NOT EXISTS idx_strain_sensor_timestamp
        ON strain_readings(sensor_id, timestamp DESC);
    CREATE INDEX IF NOT EXISTS idx_strain_timestamp
        ON strain_readings(timestamp DESC);
";

const INSERT: &str = "INSERT INTO strain_readings
    (timestamp, strain_value, raw_adc_value, sensor_id, battery_level, temperature, checksum)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Connection is `Send` but not `Sync`, hence the mutex
pub struct SqliteSink {
    conn: Mutex<Connection>,
    stats: StatsCell,
}

impl SqliteSink {
    /// Open or create a database file and ensure the schema exists
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        if let Some(parent) = db_path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(conn)
    }

    /// In-memory database, for tests and dry runs
    pub fn in_memory() -> Result<Self, ConnectorError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ConnectorError> {
        conn.execute_batch(SCHEMA)?;
        log::info!("sqlite sink ready (strain_readings)");

        Ok(Self {
            conn: Mutex::new(conn),
            stats: StatsCell::default(),
        })
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    /// Rows stored, optionally for one sensor
    pub fn count(&self, sensor_id: Option<&str>) -> Result<u64, ConnectorError> {
        let conn = self.conn.lock();
        let count: i64 = match sensor_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM strain_readings WHERE sensor_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM strain_readings", [], |row| row.get(0))?,
        };
        Ok(count.max(0) as u64)
    }

    fn write_batch(&self, batch: &[Reading], timeout: Duration) -> Result<(), ConnectorError> {
        let mut conn = self.conn.lock();
        conn.busy_timeout(timeout)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT)?;
            for reading in batch {
                stmt.execute(params![
                    reading.timestamp() as i64,
                    reading.value(),
                    reading.raw_value(),
                    reading.sensor_id(),
                    reading.battery_percent(),
                    reading.temperature_c(),
                    reading.integrity_tag().to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl DurableSink for SqliteSink {
    fn persist(&self, batch: &[Reading], timeout: Duration) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        match self.write_batch(batch, timeout) {
            Ok(()) => {
                log::debug!("stored {} readings in sqlite", batch.len());
                self.stats.record_success(batch.len(), 0);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

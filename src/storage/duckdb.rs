use super::traits::{CachedStat, ExecutionRecord, RecordStore, StorageError};
use async_trait::async_trait;
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// DuckDB implementation of [`RecordStore`].
///
/// The connection is serialized behind a mutex and every call runs on the
/// blocking pool; DuckDB commits per statement, so a reader never sees a
/// half-written record.
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Database(format!("creating data dir: {}", e)))?;
        }

        match Connection::open(path) {
            Ok(conn) => Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            }),
            Err(e) => {
                let error_msg = e.to_string();

                // A crashed writer can leave a lock held by a dead PID. If
                // that process is gone, clear the stale lock and retry once.
                if error_msg.contains("Could not set lock") {
                    tracing::warn!("database lock detected: {}", error_msg);

                    if let Some(pid) = extract_pid_from_lock_error(&error_msg) {
                        if !is_process_running(pid) {
                            tracing::warn!(pid, "lock holder is not running, clearing stale lock files");
                            remove_lock_files(path).map_err(|io_err| {
                                StorageError::Database(format!(
                                    "failed to remove stale lock files: {}",
                                    io_err
                                ))
                            })?;
                            let conn = Connection::open(path)?;
                            return Ok(Self {
                                conn: Arc::new(Mutex::new(conn)),
                            });
                        }
                        tracing::error!(pid, "lock holder is still running");
                    }
                }

                Err(e.into())
            }
        }
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn map_record_row(row: &duckdb::Row<'_>) -> Result<ExecutionRecord, duckdb::Error> {
    Ok(ExecutionRecord {
        timestamp: row.get(0)?,
        exit_code: row.get(1)?,
        message: row.get(2)?,
        ingested_at: row.get(3)?,
    })
}

const RECORD_COLUMNS: &str = "timestamp, exit_code, message, ingested_at";

#[async_trait]
impl RecordStore for DuckDbStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            // The seq column breaks timestamp ties in file order since lines
            // are inserted in the order they appear in the source log.
            conn.execute("CREATE SEQUENCE IF NOT EXISTS records_seq", [])?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS records (
                    seq BIGINT PRIMARY KEY DEFAULT nextval('records_seq'),
                    timestamp VARCHAR NOT NULL,
                    exit_code BIGINT NOT NULL,
                    message VARCHAR NOT NULL,
                    ingested_at VARCHAR NOT NULL,
                    UNIQUE (timestamp, exit_code, message)
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp)",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_records_exit_code ON records(exit_code)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS stats_cache (
                    metric VARCHAR PRIMARY KEY,
                    value DOUBLE NOT NULL,
                    computed_at VARCHAR NOT NULL
                )",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn insert(&self, record: &ExecutionRecord) -> Result<bool, StorageError> {
        let conn = self.conn.clone();
        let record = record.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let changed = conn.execute(
                "INSERT OR IGNORE INTO records (timestamp, exit_code, message, ingested_at)
                 VALUES (?, ?, ?, ?)",
                duckdb::params![
                    record.timestamp,
                    record.exit_code,
                    record.message,
                    record.ingested_at,
                ],
            )?;

            Ok::<bool, StorageError>(changed > 0)
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok::<u64, StorageError>(count as u64)
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn query_since(&self, cutoff: &str) -> Result<Vec<ExecutionRecord>, StorageError> {
        let conn = self.conn.clone();
        let cutoff = cutoff.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE timestamp >= ?
                 ORDER BY timestamp, seq"
            ))?;

            let rows = stmt.query_map(duckdb::params![cutoff], |row| map_record_row(row))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn latest_failure(&self) -> Result<Option<ExecutionRecord>, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE exit_code != 0
                 ORDER BY timestamp DESC, seq DESC
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(map_record_row(row)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn latest(&self, n: usize) -> Result<Vec<ExecutionRecord>, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 ORDER BY timestamp DESC, seq DESC
                 LIMIT ?"
            ))?;

            let rows = stmt.query_map(duckdb::params![n as i64], |row| map_record_row(row))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn cache_stat(
        &self,
        metric: &str,
        value: f64,
        computed_at: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let metric = metric.to_string();
        let computed_at = computed_at.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO stats_cache (metric, value, computed_at)
                 VALUES (?, ?, ?)",
                duckdb::params![metric, value, computed_at],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }

    async fn cached_stats(&self) -> Result<Vec<CachedStat>, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT metric, value, computed_at FROM stats_cache ORDER BY metric")?;

            let rows = stmt.query_map([], |row| {
                Ok(CachedStat {
                    metric: row.get(0)?,
                    value: row.get(1)?,
                    computed_at: row.get(2)?,
                })
            })?;

            let mut stats = Vec::new();
            for row in rows {
                stats.push(row?);
            }
            Ok(stats)
        })
        .await
        .map_err(|e| StorageError::Database(format!("task join error: {}", e)))?
    }
}

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Extract the holder PID from a DuckDB lock error message
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    // Error format: "... (PID 12345) ..."
    let start = error_msg.find("(PID ")? + 5;
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].parse().ok()
}

fn remove_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let path = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!("removed stale file: {}", path.display());
        }
    }
    Ok(())
}

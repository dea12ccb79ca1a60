use crate::cursor::CursorFile;
use crate::notify::{Notifier, Urgency};
use crate::source::{normalize, parse_line, ParseRejection};
use crate::stats;
use crate::storage::{ExecutionRecord, RecordStore, StorageError};
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Failed-run notifications truncate the message to this many characters.
const NOTIFY_MESSAGE_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error reading source log: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Bridges the append-only source log to the record store.
///
/// Single writer of both the store and the cursor. A pass that fails mid-way
/// leaves the cursor untouched and is retried in full on the next interval;
/// the store's uniqueness constraint makes the retry idempotent.
pub struct Ingestor {
    source_path: PathBuf,
    cursor: CursorFile,
    offset: u64,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl Ingestor {
    pub fn new(
        source_path: PathBuf,
        cursor_path: PathBuf,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cursor = CursorFile::new(cursor_path);
        let offset = cursor.load();
        Self {
            source_path,
            cursor,
            offset,
            store,
            notifier,
        }
    }

    /// Current in-memory read offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Rewind to the beginning of the source log (one-shot parse mode).
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Consume newly appended complete lines and return the count of newly
    /// inserted (non-duplicate) records.
    ///
    /// A trailing line without a terminating newline is left unconsumed so
    /// it is retried once complete. Per-line parse failures are logged and
    /// skipped; a storage error aborts the pass before the offset advances.
    pub async fn run_pass(&mut self) -> Result<usize, IngestError> {
        if !self.source_path.exists() {
            debug!(path = %self.source_path.display(), "source log not found, skipping pass");
            return Ok(0);
        }

        let file = File::open(&self.source_path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.offset))?;

        let mut consumed = 0u64;
        let mut inserted = 0usize;

        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }

            // Partial trailing line: the writer hasn't finished it yet.
            // Leave it for the next pass rather than ingesting a torn record.
            if !line.ends_with('\n') {
                break;
            }

            if self.process_line(&line).await? {
                inserted += 1;
            }
            consumed += bytes_read as u64;
        }

        self.offset += consumed;
        if let Err(e) = self.cursor.save(self.offset) {
            // Accepted data-loss-on-crash window: the in-memory offset keeps
            // advancing, a restart resumes from the last durable value.
            warn!(error = %e, offset = self.offset, "failed to persist cursor");
        }

        if inserted > 0 {
            info!(inserted, offset = self.offset, "ingested new records");
        }

        Ok(inserted)
    }

    /// Parse, normalize, and store one complete line. Returns whether a new
    /// record was inserted.
    async fn process_line(&self, line: &str) -> Result<bool, IngestError> {
        let entry = match parse_line(line) {
            Ok(entry) => entry,
            Err(ParseRejection::Empty) => return Ok(false),
            Err(rejection) => {
                warn!(line = line.trim(), reason = %rejection, "skipping line");
                return Ok(false);
            }
        };

        let timestamp = match normalize(&entry.timestamp) {
            Ok(normalized) => normalized,
            Err(e) => {
                // Degrade to pass-through text rather than dropping the record
                warn!(raw = %e.raw, "timestamp normalization failed, storing raw value");
                entry.timestamp.clone()
            }
        };

        let record = ExecutionRecord {
            timestamp,
            exit_code: entry.exit_code,
            message: entry.message,
            ingested_at: Utc::now().to_rfc3339(),
        };

        let is_new = self.store.insert(&record).await?;

        if is_new && record.exit_code != 0 {
            let body = format!(
                "Exit code {}: {}",
                record.exit_code,
                truncate(&record.message, NOTIFY_MESSAGE_LIMIT)
            );
            self.notifier
                .notify("Cron job failed", &body, Urgency::Critical)
                .await;
        }

        Ok(is_new)
    }

    /// Rewind and run a single pass over the whole file (parse-existing mode).
    pub async fn parse_existing(&mut self) -> Result<usize, IngestError> {
        self.reset();
        self.run_pass().await
    }

    /// Run passes on a fixed interval until the shutdown signal flips.
    ///
    /// Pass failures are logged and retried on the next tick; only the
    /// shutdown signal ends the loop. Statistics are recomputed and cached
    /// on the longer `stats_interval`.
    pub async fn watch(
        &mut self,
        check_interval: Duration,
        stats_interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(
            path = %self.source_path.display(),
            interval_secs = check_interval.as_secs(),
            "starting watch mode"
        );

        let mut last_stats: Option<tokio::time::Instant> = None;

        loop {
            match self.run_pass().await {
                Ok(_) => {}
                Err(e) => error!(error = %e, "ingestion pass failed, will retry next interval"),
            }

            let stats_due = last_stats
                .map(|t| t.elapsed() >= stats_interval)
                .unwrap_or(true);
            if stats_due {
                match stats::compute_and_cache(self.store.as_ref(), Utc::now()).await {
                    Ok(_) => last_stats = Some(tokio::time::Instant::now()),
                    Err(e) => warn!(error = %e, "failed to refresh statistics cache"),
                }
            }

            tokio::select! {
                _ = sleep(check_interval) => {}
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("watch mode stopped");
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

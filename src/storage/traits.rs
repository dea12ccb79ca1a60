use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// One job-execution observation, as persisted.
///
/// `timestamp` is UTC-normalized ISO-8601 text when normalization succeeded,
/// otherwise the raw source text. Identity is the (`timestamp`, `exit_code`,
/// `message`) triple; records are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub timestamp: String,
    pub exit_code: i64,
    pub message: String,
    pub ingested_at: String,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A cached aggregate metric, written by the periodic stats pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedStat {
    pub metric: String,
    pub value: f64,
    pub computed_at: String,
}

/// Durable record table with duplicate suppression.
///
/// Every operation commits before returning; readers never observe a
/// half-written record. The ingestion loop is the only writer, presenters
/// are concurrent readers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Insert a record if its identity triple is new. Returns true exactly
    /// once per distinct triple, false for every duplicate attempt.
    /// Duplicates are an expected condition, not an error.
    async fn insert(&self, record: &ExecutionRecord) -> Result<bool, StorageError>;

    /// Total records ever stored.
    async fn count(&self) -> Result<u64, StorageError>;

    /// Records with `timestamp >= cutoff`, ascending by timestamp with ties
    /// broken by insertion order.
    async fn query_since(&self, cutoff: &str) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// The failing record with the maximum timestamp, if any.
    async fn latest_failure(&self) -> Result<Option<ExecutionRecord>, StorageError>;

    /// The `n` most recent records, descending by timestamp.
    async fn latest(&self, n: usize) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Upsert one metric into the stats cache table.
    async fn cache_stat(
        &self,
        metric: &str,
        value: f64,
        computed_at: &str,
    ) -> Result<(), StorageError>;

    /// All cached metrics, ordered by name.
    async fn cached_stats(&self) -> Result<Vec<CachedStat>, StorageError>;
}

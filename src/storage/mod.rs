pub mod duckdb;
pub mod traits;

pub use traits::{CachedStat, ExecutionRecord, RecordStore, StorageError};

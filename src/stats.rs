use crate::storage::{ExecutionRecord, RecordStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How many of the most recent records feed the inter-run interval estimate.
const INTERVAL_SAMPLE: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct StatSnapshot {
    pub success_rate_24h: f64,
    pub total_24h: u64,
    pub failed_24h: u64,
    pub success_rate_7d: f64,
    pub total_7d: u64,
    pub last_failure: Option<FailureInfo>,
    pub avg_interval_seconds: f64,
    pub avg_interval_minutes: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub timestamp: String,
    pub exit_code: i64,
    pub message: String,
}

impl From<ExecutionRecord> for FailureInfo {
    fn from(record: ExecutionRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            exit_code: record.exit_code,
            message: record.message,
        }
    }
}

/// Compute the fixed statistic set from current store contents.
///
/// Stateless and idempotent given the same store contents and `now`; nothing
/// here mutates the store.
pub async fn compute(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
) -> Result<StatSnapshot, StorageError> {
    let day_cutoff = (now - Duration::hours(24)).to_rfc3339();
    let week_cutoff = (now - Duration::days(7)).to_rfc3339();

    let day = store.query_since(&day_cutoff).await?;
    let week = store.query_since(&week_cutoff).await?;

    let (success_rate_24h, total_24h, failed_24h) = window_stats(&day);
    let (success_rate_7d, total_7d, _) = window_stats(&week);

    let last_failure = store.latest_failure().await?.map(FailureInfo::from);

    let recent = store.latest(INTERVAL_SAMPLE).await?;
    let avg_interval_seconds = average_interval_seconds(&recent);

    Ok(StatSnapshot {
        success_rate_24h,
        total_24h,
        failed_24h,
        success_rate_7d,
        total_7d,
        last_failure,
        avg_interval_seconds,
        avg_interval_minutes: avg_interval_seconds / 60.0,
    })
}

/// Compute a snapshot and write its numeric metrics to the stats cache.
pub async fn compute_and_cache(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
) -> Result<StatSnapshot, StorageError> {
    let snapshot = compute(store, now).await?;
    let computed_at = now.to_rfc3339();

    let metrics: [(&str, f64); 7] = [
        ("success_rate_24h", snapshot.success_rate_24h),
        ("total_runs_24h", snapshot.total_24h as f64),
        ("failed_runs_24h", snapshot.failed_24h as f64),
        ("success_rate_7d", snapshot.success_rate_7d),
        ("total_runs_7d", snapshot.total_7d as f64),
        ("avg_run_interval_seconds", snapshot.avg_interval_seconds),
        ("avg_run_interval_minutes", snapshot.avg_interval_minutes),
    ];

    for (metric, value) in metrics {
        store.cache_stat(metric, value, &computed_at).await?;
    }

    Ok(snapshot)
}

fn window_stats(records: &[ExecutionRecord]) -> (f64, u64, u64) {
    let total = records.len() as u64;
    if total == 0 {
        return (0.0, 0, 0);
    }

    let successes = records.iter().filter(|r| r.is_success()).count() as u64;
    let rate = 100.0 * successes as f64 / total as f64;
    (rate, total, total - successes)
}

/// Mean absolute gap between consecutive timestamps among the most recent
/// records, newest first. This is time between starts, a proxy for cadence,
/// not job runtime. Unparseable stored timestamps are skipped.
fn average_interval_seconds(recent: &[ExecutionRecord]) -> f64 {
    let parsed: Vec<Option<DateTime<Utc>>> = recent
        .iter()
        .map(|r| {
            DateTime::parse_from_rfc3339(&r.timestamp)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .collect();

    let mut intervals = Vec::new();
    for pair in parsed.windows(2) {
        if let (Some(a), Some(b)) = (pair[0], pair[1]) {
            intervals.push((a - b).num_seconds().unsigned_abs() as f64);
        }
    }

    if intervals.is_empty() {
        return 0.0;
    }

    intervals.iter().sum::<f64>() / intervals.len() as f64
}

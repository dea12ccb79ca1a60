//! End-to-end tests over the full pipeline: JSONL source file -> ingestor ->
//! record store -> aggregator -> presenters. Everything runs against real
//! temp files and a file-backed database, the way the deployed binary does.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use cronwatch::ingest::Ingestor;
use cronwatch::notify::{Notifier, Urgency};
use cronwatch::stats;
use cronwatch::storage::duckdb::DuckDbStore;
use cronwatch::storage::RecordStore;
use cronwatch::web::api::AppState;
use cronwatch::web::server::router;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tower::ServiceExt;

/// Captures notifications instead of shelling out.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, Urgency)>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(String, String, Urgency)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str, urgency: Urgency) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string(), urgency));
    }
}

fn jsonl_line(ts: &str, exit: i64, msg: &str) -> String {
    format!(
        "{{\"ts\":\"{}\",\"exit\":{},\"msg\":\"{}\"}}\n",
        ts, exit, msg
    )
}

/// Recent timestamps so the lines land inside the 24h/7d windows.
fn recent_ts(minutes_ago: i64) -> String {
    (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339()
}

async fn open_store(db_path: &Path) -> Arc<DuckDbStore> {
    let store = DuckDbStore::new(db_path.to_path_buf()).unwrap();
    store.init_schema().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_full_pipeline_ingest_stats_notify() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("jobs.jsonl");
    let long_message = "x".repeat(150);

    let mut content = String::new();
    content.push_str(&jsonl_line(&recent_ts(180), 0, "backup ok"));
    content.push_str(&jsonl_line(&recent_ts(120), 0, "backup ok again"));
    content.push_str(&jsonl_line(&recent_ts(60), 2, &long_message));
    content.push_str(&jsonl_line(&recent_ts(30), 1, "disk full"));
    std::fs::write(&source, content).unwrap();

    let store = open_store(&dir.path().join("cronwatch.db")).await;
    let notifier = Arc::new(RecordingNotifier::default());

    let mut ingestor = Ingestor::new(
        source,
        dir.path().join("cursor"),
        store.clone(),
        notifier.clone(),
    );

    assert_eq!(ingestor.run_pass().await.unwrap(), 4);
    assert_eq!(store.count().await.unwrap(), 4);

    // Two failures, two successes inside the 24h window
    let snapshot = stats::compute(store.as_ref(), Utc::now()).await.unwrap();
    assert_eq!(snapshot.total_24h, 4);
    assert_eq!(snapshot.failed_24h, 2);
    assert!((snapshot.success_rate_24h - 50.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.total_7d, 4);
    assert!(snapshot.avg_interval_seconds > 0.0);

    let last_failure = snapshot.last_failure.unwrap();
    assert_eq!(last_failure.message, "disk full");
    assert_eq!(last_failure.exit_code, 1);

    // One notification per failing record, message truncated to 100 chars
    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(title, _, urgency)| {
        title == "Cron job failed" && *urgency == Urgency::Critical
    }));
    let truncated = sent
        .iter()
        .find(|(_, body, _)| body.starts_with("Exit code 2:"))
        .unwrap();
    assert_eq!(truncated.1, format!("Exit code 2: {}", "x".repeat(100)));
}

#[tokio::test]
async fn test_backfill_does_not_renotify() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("jobs.jsonl");
    std::fs::write(
        &source,
        jsonl_line(&recent_ts(10), 1, "it broke"),
    )
    .unwrap();

    let store = open_store(&dir.path().join("cronwatch.db")).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut ingestor = Ingestor::new(
        source,
        dir.path().join("cursor"),
        store.clone(),
        notifier.clone(),
    );

    assert_eq!(ingestor.parse_existing().await.unwrap(), 1);
    assert_eq!(notifier.sent().len(), 1);

    // Second full parse inserts nothing and must stay silent
    assert_eq!(ingestor.parse_existing().await.unwrap(), 0);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_restart_resumes_from_cursor_with_persistent_db() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("jobs.jsonl");
    let db_path = dir.path().join("cronwatch.db");
    let cursor_path = dir.path().join("cursor");

    std::fs::write(&source, jsonl_line(&recent_ts(20), 0, "first")).unwrap();

    {
        let store = open_store(&db_path).await;
        let mut ingestor = Ingestor::new(
            source.clone(),
            cursor_path.clone(),
            store.clone(),
            Arc::new(RecordingNotifier::default()),
        );
        assert_eq!(ingestor.run_pass().await.unwrap(), 1);
    }

    // Process "restarts": new store handle, new ingestor, appended line
    let mut appended = std::fs::read_to_string(&source).unwrap();
    appended.push_str(&jsonl_line(&recent_ts(10), 0, "second"));
    std::fs::write(&source, appended).unwrap();

    let store = open_store(&db_path).await;
    let mut ingestor = Ingestor::new(
        source,
        cursor_path,
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    );

    assert_eq!(ingestor.run_pass().await.unwrap(), 1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_stats_cache_refreshed() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("jobs.jsonl");
    std::fs::write(&source, jsonl_line(&recent_ts(5), 0, "ok")).unwrap();

    let store = open_store(&dir.path().join("cronwatch.db")).await;
    let mut ingestor = Ingestor::new(
        source,
        dir.path().join("cursor"),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    ingestor.run_pass().await.unwrap();

    stats::compute_and_cache(store.as_ref(), Utc::now())
        .await
        .unwrap();

    let cached = store.cached_stats().await.unwrap();
    let metrics: Vec<&str> = cached.iter().map(|s| s.metric.as_str()).collect();
    assert!(metrics.contains(&"success_rate_24h"));
    assert!(metrics.contains(&"total_runs_24h"));
    assert!(metrics.contains(&"avg_run_interval_seconds"));

    let total = cached
        .iter()
        .find(|s| s.metric == "total_runs_24h")
        .unwrap();
    assert!((total.value - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_web_api_reflects_ingested_data() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("jobs.jsonl");

    let mut content = String::new();
    content.push_str(&jsonl_line(&recent_ts(40), 0, "ran fine"));
    content.push_str(&jsonl_line(&recent_ts(20), 3, "timed out"));
    std::fs::write(&source, content).unwrap();

    let store = open_store(&dir.path().join("cronwatch.db")).await;
    let mut ingestor = Ingestor::new(
        source,
        dir.path().join("cursor"),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    ingestor.run_pass().await.unwrap();

    let app = router(AppState { store });

    let response = app
        .clone()
        .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["total_24h"], 2);
    assert_eq!(json["failed_24h"], 1);
    assert_eq!(json["last_failure"]["message"], "timed out");

    let response = app
        .oneshot(Request::get("/api/records").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let records: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 2);
    assert_eq!(records[0]["message"], "timed out");
}

use crate::stats::{self, StatSnapshot};
use crate::storage::{ExecutionRecord, RecordStore, StorageError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_RECORD_LIMIT: usize = 50;
const MAX_RECORD_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

fn storage_unavailable(e: StorageError) -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Fresh statistics snapshot. The aggregator is pure, so this is always
/// consistent with the records endpoints even while ingestion is running.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<StatSnapshot>, (StatusCode, String)> {
    let snapshot = stats::compute(state.store.as_ref(), Utc::now())
        .await
        .map_err(storage_unavailable)?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<usize>,
}

/// Most recent records, newest first. An empty store yields an empty list,
/// not an error.
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<Vec<ExecutionRecord>>, (StatusCode, String)> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECORD_LIMIT)
        .min(MAX_RECORD_LIMIT);
    let records = state
        .store
        .latest(limit)
        .await
        .map_err(storage_unavailable)?;
    Ok(Json(records))
}

pub async fn get_latest_failure(
    State(state): State<AppState>,
) -> Result<Json<Option<ExecutionRecord>>, (StatusCode, String)> {
    let failure = state
        .store
        .latest_failure()
        .await
        .map_err(storage_unavailable)?;
    Ok(Json(failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::duckdb::DuckDbStore;
    use crate::web::server::router;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn setup_state() -> AppState {
        let store = DuckDbStore::in_memory().unwrap();
        store.init_schema().await.unwrap();
        AppState {
            store: Arc::new(store),
        }
    }

    fn record(timestamp: &str, exit_code: i64, message: &str) -> ExecutionRecord {
        ExecutionRecord {
            timestamp: timestamp.to_string(),
            exit_code,
            message: message.to_string(),
            ingested_at: "2023-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let state = setup_state().await;
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let state = setup_state().await;
        let response = router(state)
            .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["total_24h"], 0);
        assert_eq!(json["success_rate_24h"], 0.0);
        assert!(json["last_failure"].is_null());
    }

    #[tokio::test]
    async fn test_records_endpoint() {
        let state = setup_state().await;
        state
            .store
            .insert(&record("2023-01-01T12:00:00+00:00", 0, "Job 1"))
            .await
            .unwrap();
        state
            .store
            .insert(&record("2023-01-01T12:01:00+00:00", 1, "Job 2"))
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::get("/api/records?limit=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 2);
        // Newest first
        assert_eq!(records[0]["message"], "Job 2");
    }

    #[tokio::test]
    async fn test_latest_failure_endpoint() {
        let state = setup_state().await;
        state
            .store
            .insert(&record("2023-01-01T12:01:00+00:00", 1, "boom"))
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::get("/api/failures/latest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "boom");
        assert_eq!(json["exit_code"], 1);
    }

    #[tokio::test]
    async fn test_dashboard_page_served() {
        let state = setup_state().await;
        let response = router(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

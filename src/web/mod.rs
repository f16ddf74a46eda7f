//! HTTP ingress surface. The push endpoint accepts both GET and POST so
//! the lightest possible clients (curl in cron, a shell trap) can report.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::heartbeat::{HeartbeatError, HeartbeatService};

#[derive(Clone)]
pub struct AppState {
    pub heartbeat: Arc<HeartbeatService>,
}

pub enum AppError {
    NotFound(String),
    Internal(String),
}

impl From<HeartbeatError> for AppError {
    fn from(err: HeartbeatError) -> Self {
        match err {
            HeartbeatError::UnknownToken => AppError::NotFound("Monitor not found".to_string()),
            HeartbeatError::Repository(e) => {
                error!(error = %e, "heartbeat repository failure");
                AppError::Internal("internal error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AppError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PushParams {
    status: Option<String>,
    msg: Option<String>,
    ping: Option<i64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/push/{token}", get(handle_push).post(handle_push))
        .route("/health", get(health))
        .with_state(state)
}

async fn handle_push(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<PushParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .heartbeat
        .process_heartbeat(
            &token,
            params.status.as_deref(),
            params.msg.as_deref(),
            params.ping,
        )
        .await?;
    Ok(Json(json!({ "ok": true })))
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonitorStatus, MonitorType};
    use crate::notifications::NotificationDispatcher;
    use crate::outcome::OutcomeRecorder;
    use crate::repository::{MemoryStore, MonitorRepository};
    use crate::testutil::monitor;
    use tokio::net::TcpListener;

    async fn serve(store: Arc<MemoryStore>) -> String {
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));
        let recorder = Arc::new(OutcomeRecorder::new(
            store.clone(),
            store.clone(),
            dispatcher,
        ));
        let heartbeat = Arc::new(HeartbeatService::new(store.clone(), recorder));
        let app = router(AppState { heartbeat });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn push_monitor(token: &str) -> crate::models::Monitor {
        let mut m = monitor(MonitorType::Push, "");
        m.push_token = Some(token.to_string());
        m
    }

    #[tokio::test]
    async fn push_endpoint_records_heartbeat() {
        let store = MemoryStore::new();
        let id = store.insert_monitor(push_monitor("tok-a"));
        let base = serve(store.clone()).await;

        let resp = reqwest::get(format!("{base}/api/push/tok-a?ping=17"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);

        let m = store.get(id).await.unwrap().unwrap();
        assert_eq!(m.last_status, MonitorStatus::Up);
    }

    #[tokio::test]
    async fn push_endpoint_accepts_explicit_down() {
        let store = MemoryStore::new();
        let id = store.insert_monitor(push_monitor("tok-b"));
        let base = serve(store.clone()).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{base}/api/push/tok-b?status=down&msg=backup+failed"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let m = store.get(id).await.unwrap().unwrap();
        assert_eq!(m.last_status, MonitorStatus::Down);
        assert_eq!(store.results_for(id)[0].message, "backup failed");
    }

    #[tokio::test]
    async fn unknown_token_yields_not_found() {
        let store = MemoryStore::new();
        let base = serve(store).await;

        let resp = reqwest::get(format!("{base}/api/push/missing")).await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Monitor not found");
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let store = MemoryStore::new();
        let base = serve(store).await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "OK");
    }
}

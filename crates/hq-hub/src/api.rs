//! # API Handlers
//!
//! Axum handlers for recording transactions and querying them. Query
//! responses use the `{code, message, data}` envelope the history client
//! expects.

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hq_core::{Row, Transaction, WherePolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".into(),
            data: Some(data),
        }
    }
}

type ApiError = (StatusCode, Json<Envelope<()>>);

fn bad_request(message: impl Into<String>) -> ApiError {
    let message = message.into();
    tracing::warn!("Rejected request: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(Envelope {
            code: StatusCode::BAD_REQUEST.as_u16(),
            message,
            data: None,
        }),
    )
}

// =============================================================================
// Router
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/query", post(query_encoded))
        .route("/api/query", post(query_json))
        .route(
            "/api/history",
            post(record_history).delete(clear_history),
        )
        .route("/api/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn index() -> &'static str {
    "hq hub: proxy history query server is running"
}

// =============================================================================
// Query
// =============================================================================

/// Form body of `/query`: the query text, base64 encoded.
#[derive(Debug, Deserialize)]
pub struct EncodedQuery {
    pub query: String,
}

/// JSON body of `/api/query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

pub async fn query_encoded(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EncodedQuery>,
) -> Result<Json<Envelope<Vec<Row>>>, ApiError> {
    let bytes = STANDARD
        .decode(form.query.trim())
        .map_err(|e| bad_request(format!("query is not valid base64: {}", e)))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| bad_request("query is not valid UTF-8"))?;
    run_query(&state, &raw).await
}

pub async fn query_json(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Envelope<Vec<Row>>>, ApiError> {
    run_query(&state, &req.query).await
}

async fn run_query(state: &AppState, raw: &str) -> Result<Json<Envelope<Vec<Row>>>, ApiError> {
    tracing::info!("Query: {}", raw);
    let snapshot = state.history.snapshot().await;
    let rows = state
        .engine
        .execute(raw, &snapshot)
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(Envelope::success(rows)))
}

// =============================================================================
// History
// =============================================================================

/// One captured exchange as raw HTTP message text.
#[derive(Debug, Deserialize)]
pub struct RecordedExchange {
    pub url: String,
    pub request: String,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordSummary {
    pub recorded: usize,
    pub stored: usize,
}

pub async fn record_history(
    State(state): State<Arc<AppState>>,
    Json(exchanges): Json<Vec<RecordedExchange>>,
) -> Result<(StatusCode, Json<Envelope<RecordSummary>>), ApiError> {
    let transactions = exchanges
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            Transaction::from_raw(&ex.url, &ex.request, ex.response.as_deref())
                .map_err(|e| bad_request(format!("record {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let recorded = state.history.record_all(transactions).await;
    let stored = state.history.len().await;
    tracing::info!("Recorded {} transactions ({} stored)", recorded, stored);

    Ok((
        StatusCode::ACCEPTED,
        Json(Envelope::success(RecordSummary { recorded, stored })),
    ))
}

pub async fn clear_history(State(state): State<Arc<AppState>>) -> StatusCode {
    let removed = state.history.clear().await;
    tracing::info!("Cleared {} transactions", removed);
    StatusCode::NO_CONTENT
}

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HubStatus {
    pub version: &'static str,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: u64,
    pub transactions: usize,
    pub capacity: usize,
    pub require_where: bool,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<HubStatus> {
    Json(HubStatus {
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        transactions: state.history.len().await,
        capacity: state.history.capacity(),
        require_where: state.engine.where_policy() == WherePolicy::Required,
    })
}

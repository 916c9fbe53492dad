//! HTTP API serving the current depth view and reconstructed positions

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::MarketDataError;
use crate::metrics::{self, RECONSTRUCTIONS, REJECTED_FILLS};
use crate::numeric::{format_duration_ms, format_timestamp_ms, format_usd};
use crate::orderbook::{BookMetrics, DepthView};
use crate::positions::{reconstruct_with_report, summarize_by_order, OrderPnl, PositionRecord};
use crate::AppState;

/// Errors returned to HTTP callers
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// Any upstream fetch failure; callers only see "load failed"
    LoadFailed(MarketDataError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::LoadFailed(err) => {
                warn!(error = %err, "Upstream load failed");
                (StatusCode::BAD_GATEWAY, "load failed".to_string())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    metrics::register_all();

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .route("/book", get(book))
        .route("/coin", post(switch_coin))
        .route("/positions", get(positions))
        .route("/positions/by-order", get(positions_by_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address and serve until the listener fails
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.http_addr;
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let (has_book, book_healthy) = match state.book.read().await.as_ref() {
        Some(book) => (true, BookMetrics::from_state(book).is_healthy()),
        None => (false, false),
    };
    let coin = state.coin_tx.borrow().clone();

    Json(json!({
        "status": "healthy",
        "component": "perp-flow",
        "coin": coin,
        "book_loaded": has_book,
        "book_healthy": book_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics_text() -> Result<String, ApiError> {
    metrics::render().map_err(|e| ApiError::Internal(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    pub levels: Option<usize>,
}

async fn book(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookQuery>,
) -> Result<Json<DepthView>, ApiError> {
    let levels = query.levels.unwrap_or(state.config.depth_levels);
    let guard = state.book.read().await;
    let book = guard
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("no book loaded yet".to_string()))?;
    Ok(Json(DepthView::from_state(book, Some(levels))))
}

#[derive(Debug, Deserialize)]
pub struct CoinRequest {
    pub coin: String,
}

async fn switch_coin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CoinRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let coin = request.coin.trim().to_string();
    if coin.is_empty() {
        return Err(ApiError::BadRequest("coin must not be empty".to_string()));
    }

    let previous = state.coin_tx.send_replace(coin.clone());
    info!(from = %previous, to = %coin, "Coin switch requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "coin": coin, "previous": previous })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub account: Option<String>,
}

/// A position record with display-ready fields alongside the raw values
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    #[serde(flatten)]
    pub record: PositionRecord,
    pub opened_at: String,
    pub closed_at: String,
    pub duration: String,
    pub realized_pnl: String,
}

impl From<&PositionRecord> for PositionView {
    fn from(record: &PositionRecord) -> Self {
        Self {
            opened_at: format_timestamp_ms(record.open_timestamp),
            closed_at: format_timestamp_ms(record.close_timestamp),
            duration: format_duration_ms(record.duration_ms),
            realized_pnl: format_usd(record.realized_pnl_usd),
            record: record.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub account: String,
    pub positions: Vec<PositionView>,
    pub total_realized_pnl_usd: Decimal,
    pub rejected_fills: usize,
    pub open_coins: Vec<String>,
}

fn resolve_account(state: &AppState, requested: Option<String>) -> Result<String, ApiError> {
    requested
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .or_else(|| state.config.account.clone())
        .ok_or_else(|| ApiError::BadRequest("account is required".to_string()))
}

async fn positions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<PositionsResponse>, ApiError> {
    let account = resolve_account(&state, query.account)?;
    let parsed = state
        .info_client
        .user_fills(&account)
        .await
        .map_err(ApiError::LoadFailed)?;

    let report = reconstruct_with_report(&parsed.fills);
    let rejected = report.rejected.len() + parsed.errors.len();
    RECONSTRUCTIONS.inc();
    REJECTED_FILLS.inc_by(rejected as u64);

    Ok(Json(PositionsResponse {
        account,
        total_realized_pnl_usd: report
            .records
            .iter()
            .fold(Decimal::ZERO, |total, r| total.saturating_add(r.realized_pnl_usd)),
        positions: report.records.iter().map(PositionView::from).collect(),
        rejected_fills: rejected,
        open_coins: report.open_coins,
    }))
}

async fn positions_by_order(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<OrderPnl>>, ApiError> {
    let account = resolve_account(&state, query.account)?;
    let parsed = state
        .info_client
        .user_fills(&account)
        .await
        .map_err(ApiError::LoadFailed)?;

    Ok(Json(summarize_by_order(&parsed.fills)))
}

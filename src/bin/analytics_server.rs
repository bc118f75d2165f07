//! Analytics HTTP server
//!
//! Serves the configured bundle through a single price-data accessor and
//! computes rolling statistics for posted portfolio series.
//!
//! Run: BUNDLE_ROOT=./bundles ANALYTICS_COINS=BTC,ETH cargo run --release --bin analytics_server

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, post}, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use backtest_analytics::{
    get_rolling_stats, initialize, list_available_symbols, AnalyticsConfig, AnalyticsError, Field,
    OhlcvTable, PortfolioValueSeries, PriceDataAccessor, PriceTable, RollingStatsResult, SummaryStats,
};

// ============================================================================
// State & Errors
// ============================================================================

struct AppState {
    bundle_dir: PathBuf,
    accessor: Mutex<PriceDataAccessor>,
}

struct ApiError(AnalyticsError);

impl From<AnalyticsError> for ApiError {
    fn from(e: AnalyticsError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AnalyticsError::SymbolNotFound { .. } | AnalyticsError::UnknownBundle(_) => StatusCode::NOT_FOUND,
            AnalyticsError::NotASession(_)
            | AnalyticsError::HistoryOutOfRange { .. }
            | AnalyticsError::InvalidRange { .. }
            | AnalyticsError::InvalidWindow(_)
            | AnalyticsError::InvalidSeries(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
struct RangeQuery {
    start: NaiveDate,
    end: NaiveDate,
    /// Comma separated field names, close when absent
    fields: Option<String>,
    periods: Option<usize>,
}

#[derive(Serialize)]
struct SymbolListResponse {
    symbols: Vec<String>,
    count: usize,
}

#[derive(Serialize)]
struct ReturnsResponse {
    periods: usize,
    returns: PriceTable,
    compute_ms: f64,
}

#[derive(Deserialize)]
struct RollingStatsRequest {
    values: Vec<f64>,
    dates: Option<Vec<NaiveDate>>,
    window: usize,
}

#[derive(Serialize)]
struct RollingStatsResponse {
    result: RollingStatsResult,
    summary: SummaryStats,
    compute_ms: f64,
}

fn parse_fields(raw: Option<&str>) -> std::result::Result<Vec<Field>, ApiError> {
    let Some(raw) = raw else {
        return Ok(vec![Field::Close]);
    };
    raw.split(',')
        .map(|f| f.trim().parse::<Field>().map_err(|e| ApiError(AnalyticsError::InvalidSeries(e))))
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_symbols(State(state): State<Arc<AppState>>) -> ApiResult<SymbolListResponse> {
    let symbols = list_available_symbols(&state.bundle_dir)?;
    let count = symbols.len();
    Ok(Json(SymbolListResponse { symbols, count }))
}

async fn get_ohlcv(State(state): State<Arc<AppState>>, Query(query): Query<RangeQuery>) -> ApiResult<OhlcvTable> {
    let fields = parse_fields(query.fields.as_deref())?;
    let accessor = state.accessor.lock().await;
    Ok(Json(accessor.ohlcv_window(query.start, query.end, &fields)?))
}

async fn get_average_price(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<PriceTable> {
    let accessor = state.accessor.lock().await;
    Ok(Json(accessor.average_price(query.start, query.end)?))
}

async fn get_returns(State(state): State<Arc<AppState>>, Query(query): Query<RangeQuery>) -> ApiResult<ReturnsResponse> {
    let start = Instant::now();
    let periods = query.periods.unwrap_or(1);

    let mut accessor = state.accessor.lock().await;
    let returns = accessor.percent_return(query.start, query.end, periods)?.clone();
    let compute_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!(cached = accessor.cached_returns(), compute_ms, "percent return served");

    Ok(Json(ReturnsResponse { periods, returns, compute_ms }))
}

async fn post_rolling_stats(Json(req): Json<RollingStatsRequest>) -> ApiResult<RollingStatsResponse> {
    let start = Instant::now();

    let dates = match req.dates {
        Some(dates) => dates,
        None => NaiveDate::default().iter_days().take(req.values.len()).collect(),
    };
    let series = PortfolioValueSeries::new(dates, req.values)?;
    let (result, summary) = get_rolling_stats(&series, req.window)?;

    let compute_ms = start.elapsed().as_secs_f64() * 1000.0;
    Ok(Json(RollingStatsResponse { result, summary, compute_ms }))
}

#[tokio::main]
async fn main() -> backtest_analytics::Result<()> {
    let config = AnalyticsConfig::from_env()?;
    let mut env = initialize(&config)?;

    let bundle_dir = env.bundle_path(&config.bundle)?.to_path_buf();
    let accessor = env.accessor(&config.coins)?;

    let state = Arc::new(AppState {
        bundle_dir,
        accessor: Mutex::new(accessor),
    });

    let app = Router::new()
        .route("/symbols", get(list_symbols))
        .route("/ohlcv", get(get_ohlcv))
        .route("/average-price", get(get_average_price))
        .route("/returns", get(get_returns))
        .route("/rolling-stats", post(post_rolling_stats))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    info!(
        addr = %config.server_addr,
        bundle = %config.bundle,
        coins = ?config.coins,
        "analytics server listening"
    );
    info!("GET  /symbols | /ohlcv?start&end&fields | /average-price?start&end | /returns?start&end&periods");
    info!("POST /rolling-stats {{values, dates?, window}}");

    axum::serve(listener, app).await?;
    Ok(())
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickerlens_core::analytics::clustering::DEFAULT_CLUSTERS;
use tickerlens_core::analytics::similarity::DEFAULT_NEIGHBORS;
use tickerlens_core::domain::catalog;
use tickerlens_core::domain::market::is_valid_symbol;
use tickerlens_core::domain::recommendation::{ClusterAssignment, Recommendation, SimilarityResult};
use tickerlens_core::pipeline::{Pipeline, QuotePayload};

const MAX_REQUEST_SYMBOLS: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pipeline = Pipeline::from_settings(&settings).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        e
    })?;

    let app = router(AppState { pipeline });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/quotes", get(get_quote))
        .route("/api/analyze-market", post(analyze_market))
        .route("/api/recommend/:symbol", get(get_recommendation))
        .route("/api/similar", post(find_similar))
        .route("/api/categories", get(list_categories))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
}

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    symbols: Vec<String>,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SimilarRequest {
    symbol: String,
    #[serde(default)]
    pool: Vec<String>,
    #[serde(default)]
    k: Option<usize>,
}

fn require_symbol(raw: &str) -> Result<String, StatusCode> {
    let symbol = raw.trim();
    if !is_valid_symbol(symbol) {
        tracing::debug!(symbol = %raw, "rejected symbol");
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(symbol.to_uppercase())
}

fn clean_symbols(raw: &[String]) -> Result<Vec<String>, StatusCode> {
    let symbols: Vec<&str> = raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if symbols.len() > MAX_REQUEST_SYMBOLS {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    symbols.into_iter().map(require_symbol).collect()
}

async fn get_quote(
    State(state): State<AppState>,
    Query(q): Query<QuoteQuery>,
) -> Result<Json<QuotePayload>, StatusCode> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(state.pipeline.quote(&symbol).await))
}

async fn analyze_market(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Vec<ClusterAssignment>>, StatusCode> {
    let symbols = clean_symbols(&req.symbols)?;
    let k = req.k.unwrap_or(DEFAULT_CLUSTERS);
    if k == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(state.pipeline.analyze_market(&symbols, k).await))
}

async fn get_recommendation(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Recommendation>, StatusCode> {
    let symbol = require_symbol(&symbol)?;
    Ok(Json(state.pipeline.recommend(&symbol).await))
}

async fn find_similar(
    State(state): State<AppState>,
    Json(req): Json<SimilarRequest>,
) -> Result<Json<Vec<SimilarityResult>>, StatusCode> {
    let symbol = require_symbol(&req.symbol)?;
    let pool = clean_symbols(&req.pool)?;
    let k = req.k.unwrap_or(DEFAULT_NEIGHBORS);
    Ok(Json(state.pipeline.similar(&symbol, &pool, k).await))
}

async fn list_categories() -> Json<BTreeMap<&'static str, Vec<String>>> {
    Json(
        catalog::categories()
            .map(|name| (name, catalog::symbols_for(name, usize::MAX)))
            .collect(),
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

fn init_sentry(settings: &tickerlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

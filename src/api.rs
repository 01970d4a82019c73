//! HTTP API for the Salyq Engine.
//!
//! This module exposes the calculation engine over a small REST API
//! built with [`axum`](https://crates.io/crates/axum).  Clients submit
//! revenue and months worked and receive the calculation, an
//! explanation and the service disclaimer as JSON.

use crate::config::AppConfig;
use crate::engine::{compute, compute_batch, EngineError};
use crate::explain::Explainer;
use crate::models::{
    BatchCalculationRequest, BatchCalculationResponse, CalculationRequest, CalculationResponse,
    CalculationResult,
};
use crate::rates::{RateBook, RateTableError};
use crate::validation::ValidationError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

/// Application state shared across requests.
///
/// Everything in here is read-only after start-up, so handlers share
/// it through an `Arc` without locking.
pub struct AppState {
    pub rates: RateBook,
    pub default_year: Option<u16>,
    pub explainer: Arc<dyn Explainer>,
    pub disclaimer: String,
}

impl AppState {
    /// Assemble the state described by `config`, loading rate tables
    /// from disk when a directory is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, RateTableError> {
        let rates = match &config.rates.table_dir {
            Some(dir) => RateBook::load_dir(dir)?,
            None => RateBook::builtin(),
        };
        let explainer = config.explainer.build();
        info!(
            years = ?rates.years().collect::<Vec<_>>(),
            explainer = explainer.name(),
            "rate tables ready"
        );
        Ok(Self {
            rates,
            default_year: config.rates.default_year,
            explainer,
            disclaimer: config.disclaimer.clone(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body")]
    MalformedBody(#[from] JsonRejection),
    #[error("invalid calculation input")]
    Validation(#[from] ValidationError),
    #[error("calculation failed")]
    Engine(#[from] EngineError),
    #[error("background task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            ApiError::MalformedBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Engine(err) => {
                error!(error = %err, "engine rejected validated input");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Task(err) => {
                error!(error = %err, "batch calculation task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        let body = Json(json!({ "error": self.to_string(), "details": details }));
        (status, body).into_response()
    }
}

/// Build the API router around an already assembled state.
///
/// `/api/v1/calculate_from_form` is the path the browser frontend
/// posts its form to; it shares the single-period handler.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/calculate", post(calculate_handler))
        .route("/api/v1/calculate_from_form", post(calculate_handler))
        .route("/api/v1/calculate/batch", post(calculate_batch_handler))
        .layer(cors_layer())
        .with_state(state)
}

/// Any origin may call the API; preflight requests are answered here.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
        ])
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}

/// Handler for POST /api/v1/calculate
async fn calculate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<CalculationResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected calculation body");
        rejection
    })?;
    info!(
        revenue = request.revenue,
        months_worked = request.months_worked,
        year = ?request.year,
        "calculation requested"
    );

    let (input, rates) = request.validate(&state.rates, state.default_year)?;
    let calculation = compute(&input, rates)?;
    debug!(?calculation, "calculation complete");

    let explanation = state.explainer.explain(&calculation, rates);
    Ok(Json(CalculationResponse {
        calculation,
        explanation,
        disclaimer: state.disclaimer.clone(),
    }))
}

/// Handler for POST /api/v1/calculate/batch
async fn calculate_batch_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchCalculationRequest>, JsonRejection>,
) -> Result<Json<BatchCalculationResponse>, ApiError> {
    let Json(request) = payload?;
    info!(periods = request.periods.len(), year = ?request.year, "batch calculation requested");

    // Validate up front so bad input is reported without touching the
    // worker pool.
    let (inputs, rates) = request.validate(&state.rates, state.default_year)?;
    let year = rates.year;
    let worker_state = Arc::clone(&state);
    let calculations = tokio::task::spawn_blocking(move || -> Result<Vec<CalculationResult>, ApiError> {
        let rates = worker_state
            .rates
            .get(year)
            .ok_or(ValidationError::UnknownYear { year })?;
        Ok(compute_batch(&inputs, rates)?)
    })
    .await??;

    Ok(Json(BatchCalculationResponse {
        calculations,
        disclaimer: state.disclaimer.clone(),
    }))
}

/// Launch the API server and block until it is shut down with Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let router = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

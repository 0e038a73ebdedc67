//! HTTP API: status, scheduler control, roster upload, address edits,
//! report export and the Prometheus endpoint.

use crate::export::render_report;
use crate::roster::{RosterFormat, parse_roster_as};
use crate::types::{AddressEdit, ErrorBody, RosterQuery, RosterResponse, StartRequest, StatusResponse};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use liveness::{LivenessStore, MetricsRegistry, ProbeScheduler};
use prometheus_client::encoding::text::encode;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<ProbeScheduler>,
    pub metrics: Option<Arc<MetricsRegistry>>,
    /// Default for `POST /roster` when `?headers=` is absent
    pub roster_has_headers: bool,
}

impl AppState {
    fn store(&self) -> &Arc<LivenessStore> {
        self.scheduler.store()
    }
}

/// Error returned by handlers, mapped onto a status code and a JSON body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] common::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(common::Error::InvalidIndex { .. }) => StatusCode::NOT_FOUND,
            ApiError::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/start", post(start_handler))
        .route("/stop", post(stop_handler))
        .route("/roster", post(roster_handler))
        .route("/address", post(address_handler))
        .route("/export", get(export_handler))
        .route("/metrics", get(metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// HTTP server for the API
pub struct ApiServer {
    state: AppState,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(state: AppState, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Serve until `shutdown` resolves, then drain open connections
    pub async fn run<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %listener.local_addr()?, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.scheduler.is_running().await,
        interval_seconds: state.scheduler.interval_seconds(),
        servers: state.store().status().await,
    })
}

/// Body is optional; an empty body starts with the current interval.
async fn start_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let request: StartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid start request: {e}")))?
    };

    let interval = request
        .interval_seconds
        .unwrap_or_else(|| state.scheduler.interval_seconds());
    state.scheduler.start(interval).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_handler(State(state): State<AppState>) -> StatusCode {
    state.scheduler.stop().await;
    StatusCode::NO_CONTENT
}

/// `?format=` wins over `Content-Type`; anything unrecognised is CSV.
async fn roster_handler(
    State(state): State<AppState>,
    Query(query): Query<RosterQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<RosterResponse>> {
    let has_headers = query.headers.unwrap_or(state.roster_has_headers);
    let format = query
        .format
        .or_else(|| {
            headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(RosterFormat::from_content_type)
        })
        .unwrap_or_default();
    let servers = parse_roster_as(&body, format, has_headers)?;
    let count = servers.len();

    state.store().replace_roster(servers).await;
    if let Some(ref m) = state.metrics {
        m.record_roster_replacement(count);
    }

    Ok(Json(RosterResponse { servers: count }))
}

async fn address_handler(
    State(state): State<AppState>,
    Json(edit): Json<AddressEdit>,
) -> ApiResult<StatusCode> {
    state
        .store()
        .edit_address(edit.index, edit.class, edit.value)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_handler(State(state): State<AppState>) -> ApiResult<Response> {
    if state.store().is_empty().await {
        return Err(ApiError::BadRequest("No roster loaded".to_string()));
    }

    let report = render_report(&state.store().status().await)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"liveness-report.csv\"",
            ),
        ],
        report,
    )
        .into_response())
}

async fn metrics_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let registry = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Metrics disabled".to_string()))?;

    let mut buffer = String::new();
    encode(&mut buffer, &registry.registry)
        .map_err(|e| ApiError::Core(common::Error::other(format!("Failed to encode metrics: {e}"))))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response())
}

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{HeaderValue, Method, Request, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use extract::{AnalysisError, AnalysisMode, Analyzer, ExtractionResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::ApiError;
use crate::metrics::{Metrics, MetricsSnapshot};

pub struct AppState {
    pub analyzer: Analyzer,
    pub metrics: Arc<Metrics>,
    pub generation_configured: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    generation_configured: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest {
    email_text: Option<String>,
}

#[derive(Deserialize)]
struct MeetingRequest {
    transcript: Option<String>,
}

pub fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/api/analyze-email", post(analyze_email))
        .route("/api/analyze-meeting", post(analyze_meeting))
        // Transcripts have no size cap
        .layer(DefaultBodyLimit::disable())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

pub fn cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    match &config.cors_allow_origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .with_context(|| format!("invalid CORS_ALLOW_ORIGIN '{}'", origin))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]))
        }
        None => Ok(CorsLayer::permissive()),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        generation_configured: state.generation_configured,
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn analyze_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Response {
    let text = match read_payload(payload, AnalysisMode::Email) {
        Ok(req) => req.and_then(|req| req.email_text),
        Err(response) => return response,
    };
    run_analysis(&state, AnalysisMode::Email, text).await.into_response()
}

async fn analyze_meeting(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MeetingRequest>, JsonRejection>,
) -> Response {
    let text = match read_payload(payload, AnalysisMode::Meeting) {
        Ok(req) => req.and_then(|req| req.transcript),
        Err(response) => return response,
    };
    run_analysis(&state, AnalysisMode::Meeting, text).await.into_response()
}

/// A body that is not JSON at all reads as missing input. Every other
/// rejection (size, content type, field types) keeps axum's own status.
fn read_payload<T>(payload: Result<Json<T>, JsonRejection>, mode: AnalysisMode) -> Result<Option<T>, Response> {
    match payload {
        Ok(Json(req)) => Ok(Some(req)),
        Err(JsonRejection::JsonSyntaxError(err)) => {
            debug!(mode = %mode, error = %err, "Unparseable request body");
            Ok(None)
        }
        Err(rejection) => {
            debug!(mode = %mode, status = %rejection.status(), error = %rejection, "Rejected request body");
            Err(rejection.into_response())
        }
    }
}

async fn run_analysis(
    state: &AppState,
    mode: AnalysisMode,
    text: Option<String>,
) -> Result<Json<ExtractionResult>, ApiError> {
    state.metrics.record_request(mode);

    // Absent field and unparseable body share the 400 path
    let outcome = match text {
        Some(text) => state.analyzer.analyze(mode, &text).await,
        None => Err(AnalysisError::InputMissing),
    };

    match outcome {
        Ok(normalized) => {
            state.metrics.record_success(normalized.mismatches.len());
            Ok(Json(normalized.result))
        }
        Err(error) => {
            state.metrics.record_failure(&error);
            Err(ApiError::new(mode, error))
        }
    }
}

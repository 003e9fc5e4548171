use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use extract::{AnalysisError, AnalysisMode};
use serde_json::json;
use tracing::{error, warn};

/// An analysis failure bound to the endpoint that produced it.
///
/// Every failure renders as one JSON shape so the UI can show a single
/// "analysis failed" message. Model output never reaches the response body.
#[derive(Debug)]
pub struct ApiError {
    pub mode: AnalysisMode,
    pub error: AnalysisError,
}

impl ApiError {
    pub fn new(mode: AnalysisMode, error: AnalysisError) -> Self {
        Self { mode, error }
    }
}

fn input_label(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::Email => "Email text",
        AnalysisMode::Meeting => "Transcript",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError { mode, error } = self;

        if let AnalysisError::InputMissing = error {
            warn!(mode = %mode, "Rejected analysis request without input");
            let body = Json(json!({
                "error": format!("{} is required", input_label(mode)),
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        match &error {
            AnalysisError::MalformedResponse { cleaned, reason } => {
                error!(mode = %mode, reason = %reason, cleaned = %cleaned, "Model reply could not be parsed");
            }
            other => {
                error!(mode = %mode, kind = other.kind(), error = ?other, "Analysis failed");
            }
        }

        let body = Json(json!({
            "error": format!("Failed to analyze {}", mode),
            "details": error.to_string(),
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

use thiserror::Error;

/// Failures of the remote generation call. All of them reach callers as
/// [`AnalysisError::GenerationFailure`].
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation API key is not configured")]
    MissingApiKey,
    #[error("failed to send request to generation service: {0}")]
    Request(#[source] reqwest::Error),
    #[error("generation request timed out")]
    Timeout,
    #[error("generation service rejected credentials ({status})")]
    Authentication { status: u16, body: String },
    #[error("generation service rate limited the request")]
    RateLimited { body: String },
    #[error("generation service returned status {status}")]
    Api { status: u16, body: String },
    #[error("failed to decode generation response: {0}")]
    Deserialization(#[source] reqwest::Error),
    #[error("generation response contained no text content")]
    EmptyContent,
}

impl GenerationError {
    /// Whether repeating the same request could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Request(_) | GenerationError::Timeout => true,
            GenerationError::RateLimited { .. } => true,
            GenerationError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Request(err)
        }
    }
}

/// Everything that can go wrong while turning raw text into an
/// [`ExtractionResult`](crate::ExtractionResult).
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no text supplied for analysis")]
    InputMissing,
    #[error("generation failed: {0}")]
    GenerationFailure(#[from] GenerationError),
    #[error("model returned an empty reply")]
    EmptyResponse,
    /// `cleaned` holds the de-fenced reply for operator logs. It is not part
    /// of the display string.
    #[error("model reply was not a usable JSON object: {reason}")]
    MalformedResponse { cleaned: String, reason: String },
}

impl AnalysisError {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InputMissing => "input_missing",
            AnalysisError::GenerationFailure(_) => "generation_failure",
            AnalysisError::EmptyResponse => "empty_response",
            AnalysisError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Timeout.is_transient());
        assert!(GenerationError::RateLimited { body: String::new() }.is_transient());
        assert!(GenerationError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!GenerationError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!GenerationError::Authentication { status: 401, body: String::new() }.is_transient());
        assert!(!GenerationError::MissingApiKey.is_transient());
        assert!(!GenerationError::EmptyContent.is_transient());
    }

    #[test]
    fn test_malformed_display_hides_reply_text() {
        let err = AnalysisError::MalformedResponse {
            cleaned: "secret transcript fragment".to_string(),
            reason: "expected value at line 1 column 1".to_string(),
        };
        let shown = err.to_string();
        assert!(!shown.contains("secret transcript fragment"));
        assert!(shown.contains("line 1 column 1"));
        assert_eq!(err.kind(), "malformed_response");
    }
}

pub mod error;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use error::{AnalysisError, GenerationError};
pub use llm::{AnthropicClient, GenerationRequest, TextGenerator};
pub use normalizer::{MismatchKind, Normalized, ResponseNormalizer, SchemaMismatch};
pub use schema::{AnalysisMode, ExtractionResult, NOT_SPECIFIED};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Fixed parameters of every generation call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: llm::DEFAULT_MODEL.to_string(),
            max_tokens: llm::DEFAULT_MAX_TOKENS,
            timeout: llm::DEFAULT_TIMEOUT,
        }
    }
}

/// Prompt builder, generator and normalizer wired together. Holds no
/// per-request state, so one instance serves concurrent requests.
#[derive(Clone)]
pub struct Analyzer {
    generator: Arc<dyn TextGenerator>,
    normalizer: ResponseNormalizer,
    settings: GenerationSettings,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: GenerationSettings) -> Self {
        Self {
            generator,
            normalizer: ResponseNormalizer::new(),
            settings,
        }
    }

    /// Analyze one email or transcript. Makes exactly one call to the generator.
    pub async fn analyze(&self, mode: AnalysisMode, raw_text: &str) -> Result<Normalized, AnalysisError> {
        if raw_text.trim().is_empty() {
            return Err(AnalysisError::InputMissing);
        }

        let request = GenerationRequest {
            prompt: prompt::build_prompt(mode, raw_text),
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            timeout: self.settings.timeout,
        };
        debug!(mode = %mode, prompt_len = request.prompt.len(), "Built extraction prompt");

        // One outbound call, no retries at this layer
        let reply = self.generator.generate(&request).await?;
        let normalized = self.normalizer.normalize_with_report(&reply, mode)?;

        info!(
            mode = %mode,
            action_items = normalized.result.action_items.len(),
            risks = normalized.result.risks.len(),
            decisions = normalized.result.decisions.len(),
            substitutions = normalized.mismatches.len(),
            "Analysis complete"
        );

        Ok(normalized)
    }
}

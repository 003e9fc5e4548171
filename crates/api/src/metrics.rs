use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use extract::{AnalysisError, AnalysisMode, GenerationError, GenerationRequest, TextGenerator};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    email_requests: AtomicUsize,
    meeting_requests: AtomicUsize,

    // Failures by kind
    input_missing: AtomicUsize,
    generation_failures: AtomicUsize,
    empty_responses: AtomicUsize,
    malformed_responses: AtomicUsize,

    // Fields replaced with defaults during normalization
    schema_substitutions: AtomicUsize,

    // Generator calls and their wall time (in microseconds), failures included
    generation_calls: AtomicUsize,
    total_generation_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            email_requests: AtomicUsize::new(0),
            meeting_requests: AtomicUsize::new(0),
            input_missing: AtomicUsize::new(0),
            generation_failures: AtomicUsize::new(0),
            empty_responses: AtomicUsize::new(0),
            malformed_responses: AtomicUsize::new(0),
            schema_substitutions: AtomicUsize::new(0),
            generation_calls: AtomicUsize::new(0),
            total_generation_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_request(&self, mode: AnalysisMode) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match mode {
            AnalysisMode::Email => self.email_requests.fetch_add(1, Ordering::Relaxed),
            AnalysisMode::Meeting => self.meeting_requests.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_success(&self, substitutions: usize) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.schema_substitutions.fetch_add(substitutions, Ordering::Relaxed);
    }

    pub fn record_generation(&self, duration: Duration) {
        self.generation_calls.fetch_add(1, Ordering::Relaxed);
        self.total_generation_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &AnalysisError) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match error {
            AnalysisError::InputMissing => &self.input_missing,
            AnalysisError::GenerationFailure(_) => &self.generation_failures,
            AnalysisError::EmptyResponse => &self.empty_responses,
            AnalysisError::MalformedResponse { .. } => &self.malformed_responses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let generation_calls = self.generation_calls.load(Ordering::Relaxed);
        let total_us = self.total_generation_time_us.load(Ordering::Relaxed) as f64;
        let avg_generation_time_ms = if generation_calls > 0 {
            total_us / generation_calls as f64 / 1000.0 // Convert to ms
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            email_requests: self.email_requests.load(Ordering::Relaxed),
            meeting_requests: self.meeting_requests.load(Ordering::Relaxed),
            failures: FailureCounts {
                input_missing: self.input_missing.load(Ordering::Relaxed),
                generation_failure: self.generation_failures.load(Ordering::Relaxed),
                empty_response: self.empty_responses.load(Ordering::Relaxed),
                malformed_response: self.malformed_responses.load(Ordering::Relaxed),
            },
            schema_substitutions: self.schema_substitutions.load(Ordering::Relaxed),
            generation_calls,
            avg_generation_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub email_requests: usize,
    pub meeting_requests: usize,
    pub failures: FailureCounts,
    pub schema_substitutions: usize,
    pub generation_calls: usize,
    pub avg_generation_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct FailureCounts {
    pub input_missing: usize,
    pub generation_failure: usize,
    pub empty_response: usize,
    pub malformed_response: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Wraps a generator and records the wall time of every call, successful or not.
pub struct TimedGenerator<G> {
    inner: G,
    metrics: Arc<Metrics>,
}

impl<G: TextGenerator> TimedGenerator<G> {
    pub fn new(inner: G, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for TimedGenerator<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let timer = TimedOperation::start();
        let outcome = self.inner.generate(request).await;
        self.metrics.record_generation(timer.elapsed());
        outcome
    }
}

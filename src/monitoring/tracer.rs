/*!
 * Request Tracing
 * Structured tracing for open requests and their external-call stages
 *
 * Features:
 * - Trace ID per request for log correlation
 * - Stage spans timing every external call, with slow-stage warnings
 * - JSON-formatted logs for structured parsing
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Enables JSON log output when set to `1` or `true`
pub const ENV_TRACE_JSON: &str = "DLP_BROKER_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - DLP_BROKER_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if result.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Root span of one broker request
#[derive(Debug)]
pub struct RequestSpan {
    span: Span,
    trace_id: String,
}

impl RequestSpan {
    pub fn new(operation: &'static str, subject: &str) -> Self {
        let trace_id = generate_trace_id();
        let span = info_span!(
            "dlp_request",
            trace_id = %trace_id,
            operation = operation,
            subject = subject,
            outcome = tracing::field::Empty,
        );
        Self { span, trace_id }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Span to instrument the request future with
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.span.record("outcome", outcome);
    }
}

/// Timer for one external-call stage; logs its duration on drop
#[derive(Debug)]
pub struct StageSpan {
    span: Span,
    stage: &'static str,
    start: Instant,
    slow_threshold: Duration,
}

impl StageSpan {
    pub fn new(stage: &'static str, slow_threshold: Duration) -> Self {
        let span = info_span!(
            "dlp_stage",
            stage = stage,
            duration_ms = tracing::field::Empty,
            error = tracing::field::Empty,
        );
        Self {
            span,
            stage,
            start: Instant::now(),
            slow_threshold,
        }
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for StageSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let duration_ms = duration.as_millis() as u64;
        self.span.record("duration_ms", duration_ms);
        let _entered = self.span.enter();

        if duration > self.slow_threshold {
            warn!(stage = self.stage, duration_ms, slow = true, "slow stage detected");
        } else {
            debug!(stage = self.stage, duration_ms, "stage completed");
        }
    }
}

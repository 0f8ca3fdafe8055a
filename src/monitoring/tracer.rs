/*!
 * Structured Tracing
 * Subscriber setup and the spans runtimes and logical threads execute in
 *
 * Library code logs through the `log` facade; the subscriber installed here
 * bridges those records so they carry the enclosing span fields.
 */

use crate::core::types::{ExitCode, Tid};
use std::time::Instant;
use tracing::{info, span, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Environment variable selecting JSON output
pub const TRACE_JSON_ENV: &str = "UTHREAD_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - UTHREAD_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Span a logical thread runs inside, from first start to exit
pub fn thread_span(runtime: Uuid, tid: Tid) -> Span {
    span!(Level::DEBUG, "uthread", runtime = %runtime, tid = tid.0)
}

/// Span covering one `Runtime::run`
pub struct RunSpan {
    span: Span,
    start: Instant,
}

impl RunSpan {
    pub fn new(runtime: Uuid) -> Self {
        let span = span!(
            Level::INFO,
            "runtime",
            runtime = %runtime,
            exit_code = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    /// Record the terminal exit code and elapsed time
    pub fn record_exit(&self, code: ExitCode) {
        self.span.record("exit_code", code);
        self.span
            .record("duration_ms", self.start.elapsed().as_millis() as u64);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/*!
 * Monitoring
 * Tracing subscriber setup and runtime/thread spans
 */

mod tracer;

pub use tracer::{init_tracing, thread_span, RunSpan, TRACE_JSON_ENV};

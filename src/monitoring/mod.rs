/*!
 * Monitoring Module
 * Request tracing and DLP telemetry
 */

pub mod event_log;
pub mod telemetry;
pub mod tracer;

pub use event_log::{EventLog, EventLogStats};
pub use telemetry::{
    EventCode, EventKind, EventName, EventParams, Telemetry, TelemetryEvent, TelemetrySink,
    TracingSink,
};
pub use tracer::{generate_trace_id, init_tracing, RequestSpan, StageSpan};

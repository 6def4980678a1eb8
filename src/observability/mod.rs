//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Counters
//! - Lifecycle event tracing
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on query results
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aeroquery::observability::{log_event, Event, MetricsRegistry, ObservationScope};
//!
//! log_event(Event::RequestReceived, &[("request_id", "...")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_requests_received();
//!
//! let scope = ObservationScope::new("EXECUTE");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event at its default severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = event.severity();
    if severity >= Severity::Error {
        Logger::log_stderr(severity, event.as_str(), fields);
    } else {
        Logger::log(severity, event.as_str(), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::RequestReceived, &[("request_id", "r1")]);
        log_event(Event::RequestFailed, &[("code", "AERO_EXECUTION_FAILED")]);
    }
}

//! Observable events
//!
//! Events are explicit and typed. Each renders to a stable
//! SCREAMING_SNAKE_CASE name used as the `event` key of a log line.

use std::fmt;

use super::logger::Severity;

/// Observable events in the query pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Engine configuration loaded
    ConfigLoaded,
    /// Schema model loaded
    ModelLoaded,

    // Request lifecycle
    /// Request entered the pipeline
    RequestReceived,
    /// A pre-filter supplied the result
    RequestShortCircuited,
    /// Request finished with a result
    RequestCompleted,
    /// Request aborted with an error
    RequestFailed,
    /// Request cancelled by the caller
    RequestCancelled,

    // Rewriting
    /// Query tree fully sourced
    RewriteComplete,
    /// First data reference sourced as the root queryable
    SourceRoot,
    /// Later data reference sourced relative to the root
    SourceEmbedded,
    /// An inspector rejected a node
    InspectionDenied,

    // Execution
    /// Backend executed the sourced tree
    QueryExecuted,
    /// Rewritten tree reported without execution
    ExplainComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ModelLoaded => "MODEL_LOADED",
            Event::RequestReceived => "REQUEST_RECEIVED",
            Event::RequestShortCircuited => "REQUEST_SHORT_CIRCUITED",
            Event::RequestCompleted => "REQUEST_COMPLETED",
            Event::RequestFailed => "REQUEST_FAILED",
            Event::RequestCancelled => "REQUEST_CANCELLED",
            Event::RewriteComplete => "REWRITE_COMPLETE",
            Event::SourceRoot => "SOURCE_ROOT",
            Event::SourceEmbedded => "SOURCE_EMBEDDED",
            Event::InspectionDenied => "INSPECTION_DENIED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
        }
    }

    /// Default severity for logging this event
    pub fn severity(&self) -> Severity {
        match self {
            Event::SourceEmbedded => Severity::Trace,
            Event::InspectionDenied | Event::RequestCancelled => Severity::Warn,
            Event::RequestFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

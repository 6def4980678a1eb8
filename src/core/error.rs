//! Core Error Types
//!
//! Unified error handling for the query pipeline.

use thiserror::Error;

use crate::rewrite::RewriteError;

use super::state::RequestState;

/// Core module result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Rewriting the query tree failed
    #[error("{0}")]
    Rewrite(#[from] RewriteError),

    /// Query description could not be turned into a query tree
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend failure, propagated verbatim
    #[error("Execution error: {0}")]
    Execution(String),

    /// A request filter refused or failed
    #[error("Request filter '{filter}' failed: {message}")]
    RequestFilter { filter: String, message: String },

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Pipeline state machine violation
    #[error("Illegal state transition from {from} to {to}")]
    IllegalTransition { from: RequestState, to: RequestState },
}

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a request filter error
    pub fn request_filter(filter: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RequestFilter {
            filter: filter.into(),
            message: msg.into(),
        }
    }

    /// Get error code for responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rewrite(e) => e.code(),
            Self::Validation(_) => "AERO_QUERY_INVALID",
            Self::Execution(_) => "AERO_EXECUTION_FAILED",
            Self::RequestFilter { .. } => "AERO_REQUEST_FILTER_FAILED",
            Self::Cancelled => "AERO_REQUEST_CANCELLED",
            Self::IllegalTransition { .. } => "AERO_ILLEGAL_TRANSITION",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rewrite(e) => match e {
                RewriteError::InspectionFailed { .. } | RewriteError::AccessDenied(_) => 403,
                RewriteError::UnknownSource(_) => 404,
                RewriteError::UnsupportedQuery(_) => 501,
                RewriteError::DepthExceeded(_) => 400,
                RewriteError::TypeMismatch { .. }
                | RewriteError::MalformedSource(_)
                | RewriteError::Hook { .. } => 500,
            },
            Self::Validation(_) => 400,
            Self::RequestFilter { .. } => 400,
            Self::Cancelled => 499,
            Self::Execution(_) => 500,
            Self::IllegalTransition { .. } => 500,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<crate::schema::SchemaError> for CoreError {
    fn from(e: crate::schema::SchemaError) -> Self {
        Self::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_error_wrapped() {
        let err: CoreError = RewriteError::InspectionFailed {
            inspector: "read".into(),
            target: "Orders".into(),
        }
        .into();

        assert_eq!(err.code(), "AERO_REWRITE_INSPECTION_FAILED");
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "Inspector 'read' denied access to Orders");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CoreError::validation("bad").status_code(), 400);
        assert_eq!(CoreError::execution("down").status_code(), 500);
        assert_eq!(CoreError::Cancelled.status_code(), 499);
        assert_eq!(
            CoreError::from(RewriteError::UnknownSource("X".into())).status_code(),
            404
        );
    }

    #[test]
    fn test_execution_message_verbatim() {
        let err = CoreError::execution("disk on fire");
        assert_eq!(err.to_string(), "Execution error: disk on fire");
    }
}

//! # Rewrite Errors
//!
//! Every variant aborts the walk. None are retried.

use thiserror::Error;

use crate::expr::QueryType;

/// Result type for rewrite operations
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Query tree rewrite errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RewriteError {
    // ==================
    // Engine invariants
    // ==================
    /// A hook returned a node whose type is not assignable to the original
    #[error("Hook '{hook}' changed type from {expected} to {actual}")]
    TypeMismatch {
        hook: String,
        expected: QueryType,
        actual: QueryType,
    },

    /// No sourcer registered, or the sourcer produced nothing
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Sourcer result violates the root/embedded contract
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    /// Data reference names no schema element
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Walk nested deeper than the configured limit
    #[error("Query tree exceeds maximum depth {0}")]
    DepthExceeded(usize),

    // ==================
    // Hook outcomes
    // ==================
    /// An inspector rejected the visited node
    #[error("Inspector '{inspector}' denied access to {target}")]
    InspectionFailed { inspector: String, target: String },

    /// A hook refused the request
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A hook failed
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },
}

impl RewriteError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            RewriteError::TypeMismatch { .. } => "AERO_REWRITE_TYPE_MISMATCH",
            RewriteError::UnsupportedQuery(_) => "AERO_REWRITE_UNSUPPORTED_QUERY",
            RewriteError::MalformedSource(_) => "AERO_REWRITE_MALFORMED_SOURCE",
            RewriteError::UnknownSource(_) => "AERO_REWRITE_UNKNOWN_SOURCE",
            RewriteError::DepthExceeded(_) => "AERO_REWRITE_DEPTH_EXCEEDED",
            RewriteError::InspectionFailed { .. } => "AERO_REWRITE_INSPECTION_FAILED",
            RewriteError::AccessDenied(_) => "AERO_REWRITE_ACCESS_DENIED",
            RewriteError::Hook { .. } => "AERO_REWRITE_HOOK_FAILED",
        }
    }

    /// Whether the failure is an authorization outcome rather than a defect
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            RewriteError::InspectionFailed { .. } | RewriteError::AccessDenied(_)
        )
    }

    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        RewriteError::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

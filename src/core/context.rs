//! Request Context
//!
//! Context carried through the query pipeline.
//! Contains auth info, free-form properties and tracing metadata.
//! Hooks see it through the rewrite context; request filters see it directly.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Context carried through the query pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Authentication context
    pub auth: AuthContext,

    /// Caller-supplied properties (tenant, locale, ...)
    pub properties: HashMap<String, Value>,

    /// Wall-clock arrival time
    pub received_at: DateTime<Utc>,

    /// Start time for duration tracking
    started_at: Instant,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(auth: AuthContext) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            auth,
            properties: HashMap::new(),
            received_at: Utc::now(),
            started_at: Instant::now(),
        }
    }

    /// Create an anonymous context
    pub fn anonymous() -> Self {
        Self::new(AuthContext::anonymous())
    }

    /// Create a service role context
    pub fn service_role() -> Self {
        Self::new(AuthContext::service_role())
    }

    /// Create a context for an authenticated user
    pub fn for_user(user_id: Uuid) -> Self {
        Self::new(AuthContext::authenticated(user_id))
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Whether row-level restrictions are bypassed
    pub fn bypass_row_security(&self) -> bool {
        self.auth.is_service_role
    }

    /// Set a property
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Authentication context
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// The authenticated user's ID
    pub user_id: Option<Uuid>,

    /// Whether the request is authenticated
    pub is_authenticated: bool,

    /// Whether using service role (bypasses row security and read policies)
    pub is_service_role: bool,

    /// Custom claims
    pub claims: HashMap<String, Value>,
}

impl AuthContext {
    /// Create context for an authenticated user
    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_authenticated: true,
            is_service_role: false,
            claims: HashMap::new(),
        }
    }

    /// Add a claim
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    /// Create anonymous context
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create service role context
    pub fn service_role() -> Self {
        Self {
            user_id: None,
            is_authenticated: true,
            is_service_role: true,
            claims: HashMap::new(),
        }
    }

    /// Require user ID, returning error description if missing
    pub fn require_user_id(&self) -> Result<Uuid, &'static str> {
        self.user_id.ok_or("Authentication required")
    }
}

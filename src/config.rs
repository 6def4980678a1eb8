//! Engine configuration
//!
//! Loaded from a JSON file; every field is optional:
//!
//! ```json
//! {
//!   "max_depth": 256,
//!   "log_severity": "INFO",
//!   "api_root": "api",
//!   "default_policy": "allow",
//!   "policies": {"Orders": "authenticated"},
//!   "row_security": {"owner_field": "owner_id", "collections": ["Orders"]}
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conventions::{
    AccessPolicy, MemberAccessNormalizer, ReadAuthorizer, RowSecurityFilter, DEFAULT_OWNER_FIELD,
};
use crate::observability::Severity;
use crate::rewrite::{HookRegistry, Sourcer, DEFAULT_MAX_DEPTH};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "AERO_CONFIG_READ_FAILED",
            ConfigError::Parse(_) => "AERO_CONFIG_PARSE_FAILED",
            ConfigError::Invalid { .. } => "AERO_CONFIG_INVALID",
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Ownership row security settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSecurityConfig {
    #[serde(default = "default_owner_field")]
    pub owner_field: String,
    #[serde(default)]
    pub collections: Vec<String>,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum rewrite frame depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum log severity (TRACE..FATAL)
    #[serde(default = "default_log_severity")]
    pub log_severity: String,

    /// Parameter name sources are addressed through (`api.Customers`)
    #[serde(default = "default_api_root")]
    pub api_root: String,

    /// Read policy for collections without their own
    #[serde(default)]
    pub default_policy: AccessPolicy,

    /// Per-collection read policies
    #[serde(default)]
    pub policies: HashMap<String, AccessPolicy>,

    #[serde(default)]
    pub row_security: Option<RowSecurityConfig>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_log_severity() -> String {
    "INFO".to_string()
}
fn default_api_root() -> String {
    "api".to_string()
}
fn default_owner_field() -> String {
    DEFAULT_OWNER_FIELD.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            log_severity: default_log_severity(),
            api_root: default_api_root(),
            default_policy: AccessPolicy::default(),
            policies: HashMap::new(),
            row_security: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::invalid("max_depth", "must be > 0"));
        }
        if Severity::parse(&self.log_severity).is_none() {
            return Err(ConfigError::invalid(
                "log_severity",
                format!("unknown severity '{}'", self.log_severity),
            ));
        }
        let identifier = self
            .api_root
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && self.api_root.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !identifier {
            return Err(ConfigError::invalid(
                "api_root",
                format!("'{}' is not an identifier", self.api_root),
            ));
        }
        if let Some(rs) = &self.row_security {
            if rs.owner_field.is_empty() {
                return Err(ConfigError::invalid("row_security.owner_field", "must not be empty"));
            }
        }
        Ok(())
    }

    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_severity).unwrap_or(Severity::Info)
    }

    pub fn read_authorizer(&self) -> ReadAuthorizer {
        self.policies
            .iter()
            .fold(ReadAuthorizer::new(self.default_policy), |auth, (name, policy)| {
                auth.with_policy(name.clone(), *policy)
            })
    }

    pub fn row_security_filter(&self) -> Option<RowSecurityFilter> {
        let rs = self.row_security.as_ref()?;
        Some(
            rs.collections
                .iter()
                .fold(RowSecurityFilter::new(rs.owner_field.clone()), |f, c| f.protect(c.clone())),
        )
    }

    /// Assemble the hook registry this configuration describes
    pub fn hook_registry(&self, sourcer: impl Sourcer + 'static) -> Arc<HookRegistry> {
        let mut builder = HookRegistry::builder()
            .normalizer(MemberAccessNormalizer::new(self.api_root.clone()))
            .inspector(self.read_authorizer())
            .sourcer(sourcer);
        if let Some(filter) = self.row_security_filter() {
            builder = builder.filter(filter);
        }
        builder.build()
    }
}

//! Read authorization
//!
//! Per-collection read policies checked while the tree is walked, before
//! anything is sourced. The service role bypasses every policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::referenced_collection;
use crate::core::AuthContext;
use crate::rewrite::{Inspector, RewriteContext, RewriteResult};

/// Who may read a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Anyone
    #[default]
    Allow,
    /// Nobody but the service role
    Deny,
    /// Authenticated callers only
    Authenticated,
}

impl AccessPolicy {
    pub fn permits(&self, auth: &AuthContext) -> bool {
        if auth.is_service_role {
            return true;
        }
        match self {
            AccessPolicy::Allow => true,
            AccessPolicy::Deny => false,
            AccessPolicy::Authenticated => auth.is_authenticated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPolicy::Allow => "allow",
            AccessPolicy::Deny => "deny",
            AccessPolicy::Authenticated => "authenticated",
        }
    }
}

/// Inspector enforcing read policies on data references
#[derive(Debug, Clone, Default)]
pub struct ReadAuthorizer {
    policies: HashMap<String, AccessPolicy>,
    default_policy: AccessPolicy,
}

impl ReadAuthorizer {
    pub fn new(default_policy: AccessPolicy) -> Self {
        Self {
            policies: HashMap::new(),
            default_policy,
        }
    }

    pub fn with_policy(mut self, collection: impl Into<String>, policy: AccessPolicy) -> Self {
        self.policies.insert(collection.into(), policy);
        self
    }

    pub fn policy_for(&self, collection: &str) -> AccessPolicy {
        self.policies
            .get(collection)
            .copied()
            .unwrap_or(self.default_policy)
    }
}

impl Inspector for ReadAuthorizer {
    fn name(&self) -> &str {
        "read_authorizer"
    }

    fn inspect(&self, ctx: &RewriteContext<'_>) -> RewriteResult<bool> {
        let (reference, collection) = match referenced_collection(ctx) {
            Some(found) => found,
            None => return Ok(true),
        };
        let auth = &ctx.request().auth;
        // a policy on the element itself wins over its owning collection
        let policy = self
            .policies
            .get(&reference.name)
            .copied()
            .unwrap_or_else(|| self.policy_for(&collection));
        Ok(policy.permits(auth))
    }
}

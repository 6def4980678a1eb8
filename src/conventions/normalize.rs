//! Member access on the API root
//!
//! Front ends address sources as members of a root parameter
//! (`api.Customers`). The normalizer turns such accesses into canonical
//! data references so later hooks see a single form.

use crate::expr::{Expr, ExprKind};
use crate::rewrite::{Normalizer, RewriteContext, RewriteError, RewriteResult};
use crate::schema::SchemaElement;

/// Rewrites `Member(Parameter(api_root), Name)` into `Source(Name)`
#[derive(Debug, Clone)]
pub struct MemberAccessNormalizer {
    api_root: String,
}

impl MemberAccessNormalizer {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }
}

impl Default for MemberAccessNormalizer {
    fn default() -> Self {
        Self::new("api")
    }
}

impl Normalizer for MemberAccessNormalizer {
    fn name(&self) -> &str {
        "member_access"
    }

    fn normalize(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>> {
        let (target, name) = match ctx.node().map(|n| n.kind()) {
            Some(ExprKind::Member { target, name }) => (target, name),
            _ => return Ok(None),
        };
        match target.kind() {
            ExprKind::Parameter(param) if *param == self.api_root => {}
            _ => return Ok(None),
        }

        // functions need arguments and are never addressed as members
        match ctx.model().resolve(name, None) {
            Some(SchemaElement::Collection { .. }) | Some(SchemaElement::Singleton { .. }) => ctx
                .model()
                .source_expr(name)
                .map(Some)
                .map_err(|e| RewriteError::UnknownSource(e.message().to_string())),
            Some(SchemaElement::Function(_)) => Ok(None),
            None => Err(RewriteError::UnknownSource(name.clone())),
        }
    }
}

//! Rewrite Engine
//!
//! Walks a query tree bottom-up. Per visited node:
//!
//! 1. Substitution hit: take the substitute, skip to sourcing
//! 2. Normalize (first match, reverse registration)
//! 3. Recurse into children unless the node is a data reference
//! 4. Inspect (all must pass, reverse registration)
//! 5. Expand data references (first match, reverse registration);
//!    the expansion is walked under an unbound frame
//! 6. Filter (all, registration order); each filtered tree is re-walked
//!    under an unbound frame with the original node substituted
//! 7. Source data references that are still unchanged
//!
//! Every replacement a hook supplies must keep the node's static type
//! assignable; a violation aborts the walk.

use crate::expr::{Constant, Expr, ExprKind, ProxyId};
use crate::observability::{Event, Logger};

use super::context::RewriteContext;
use super::errors::{RewriteError, RewriteResult};
use super::hooks::SourceMode;

/// The query tree walker
pub struct RewriteEngine;

impl RewriteEngine {
    /// Rewrite `query` into a fully sourced tree.
    ///
    /// The walk runs under an unbound top-level frame so that the root
    /// node's binding feeds the originating collection.
    pub fn rewrite(ctx: &mut RewriteContext<'_>, query: &Expr) -> RewriteResult<Expr> {
        ctx.nested(None, |ctx| Self::visit(ctx, query))
    }

    fn visit(ctx: &mut RewriteContext<'_>, node: &Expr) -> RewriteResult<Expr> {
        if let Some(substitute) = ctx.substitution(node.id()).cloned() {
            return ctx.nested(Some(&substitute), |ctx| Self::source(ctx, substitute.clone()));
        }
        ctx.nested(Some(node), |ctx| Self::visit_frame(ctx, node))
    }

    fn visit_frame(ctx: &mut RewriteContext<'_>, node: &Expr) -> RewriteResult<Expr> {
        Self::normalize(ctx, node)?;
        let original = match ctx.node() {
            Some(n) => n.clone(),
            None => return Ok(node.clone()),
        };

        let mut current = if ctx.binding().is_data_reference() {
            original.clone()
        } else {
            Self::visit_children(ctx, &original)?
        };

        Self::inspect(ctx, &original)?;

        if ctx.binding().is_data_reference() {
            if let Some(expanded) = Self::expand(ctx, &original)? {
                current = ctx.nested(None, |ctx| Self::visit(ctx, &expanded))?;
            }
        }

        current = Self::filter(ctx, &original, current)?;

        Self::source(ctx, current)
    }

    fn normalize(ctx: &mut RewriteContext<'_>, node: &Expr) -> RewriteResult<()> {
        let hooks = ctx.hooks();
        for normalizer in hooks.normalizers().iter().rev() {
            if let Some(normalized) = normalizer.normalize(ctx)? {
                if normalized.is_same(node) {
                    continue;
                }
                check_type(normalizer.name(), node, &normalized)?;
                ctx.replace(normalized)?;
                break;
            }
        }
        Ok(())
    }

    fn visit_children(ctx: &mut RewriteContext<'_>, node: &Expr) -> RewriteResult<Expr> {
        let children = node.children();
        if children.is_empty() {
            return Ok(node.clone());
        }
        let mut rewritten = Vec::with_capacity(children.len());
        for child in children {
            rewritten.push(Self::visit(ctx, child)?);
        }
        Ok(node.with_children(rewritten))
    }

    fn inspect(ctx: &RewriteContext<'_>, node: &Expr) -> RewriteResult<()> {
        for inspector in ctx.hooks().inspectors().iter().rev() {
            if !inspector.inspect(ctx)? {
                let target = ctx
                    .binding()
                    .as_data_reference()
                    .map(|r| r.name.clone())
                    .unwrap_or_else(|| node.to_string());
                Logger::warn(
                    Event::InspectionDenied.as_str(),
                    &[("inspector", inspector.name()), ("target", target.as_str())],
                );
                return Err(RewriteError::InspectionFailed {
                    inspector: inspector.name().to_string(),
                    target,
                });
            }
        }
        Ok(())
    }

    fn expand(ctx: &RewriteContext<'_>, node: &Expr) -> RewriteResult<Option<Expr>> {
        for expander in ctx.hooks().expanders().iter().rev() {
            if let Some(expanded) = expander.expand(ctx)? {
                if expanded.is_same(node) {
                    continue;
                }
                check_type(expander.name(), node, &expanded)?;
                return Ok(Some(expanded));
            }
        }
        Ok(None)
    }

    /// Apply every filter to the original node, composing through substitution
    fn filter(ctx: &mut RewriteContext<'_>, original: &Expr, mut current: Expr) -> RewriteResult<Expr> {
        let hooks = ctx.hooks();
        for filter in hooks.filters() {
            let filtered = match filter.filter(ctx)? {
                Some(filtered) if !filtered.is_same(original) && !filtered.is_same(&current) => {
                    filtered
                }
                _ => continue,
            };
            check_type(filter.name(), original, &filtered)?;
            current = ctx.with_substitution(original.id(), current, |ctx| {
                ctx.nested(None, |ctx| Self::visit(ctx, &filtered))
            })?;
        }
        Ok(current)
    }

    /// Terminal step: source the frame's node if it is an unchanged data reference
    fn source(ctx: &mut RewriteContext<'_>, current: Expr) -> RewriteResult<Expr> {
        let unchanged = ctx.node().map(|n| n.is_same(&current)).unwrap_or(false);
        let reference = match ctx.binding().as_data_reference() {
            Some(r) if unchanged => r.name.clone(),
            _ => return Ok(current),
        };

        let sourcer = ctx.hooks().sourcer().cloned().ok_or_else(|| {
            RewriteError::UnsupportedQuery(format!("No sourcer registered for '{}'", reference))
        })?;

        let root_proxy = ctx.root().map(|r| r.proxy());
        let mode = match root_proxy {
            None => SourceMode::Root,
            Some(_) => SourceMode::Embedded,
        };

        ctx.record_sourcing();
        let sourced = sourcer.source(ctx, mode)?.ok_or_else(|| {
            RewriteError::UnsupportedQuery(format!(
                "Sourcer '{}' cannot source '{}'",
                sourcer.name(),
                reference
            ))
        })?;

        match (mode, root_proxy) {
            (SourceMode::Root, _) => {
                let queryable = match sourced.kind() {
                    ExprKind::Constant(Constant::Queryable(q)) => q.clone(),
                    _ => {
                        return Err(RewriteError::MalformedSource(format!(
                            "Root source for '{}' is not a native queryable",
                            reference
                        )))
                    }
                };
                let replacement = queryable.expression();
                check_type(sourcer.name(), &current, &replacement)?;
                Logger::info(
                    Event::SourceRoot.as_str(),
                    &[
                        ("mode", mode.as_str()),
                        ("proxy", queryable.proxy().to_string().as_str()),
                        ("source", reference.as_str()),
                    ],
                );
                ctx.set_root(queryable);
                Ok(replacement)
            }
            (SourceMode::Embedded, Some(proxy)) => {
                check_embedded(&reference, &sourced, proxy)?;
                check_type(sourcer.name(), &current, &sourced)?;
                Logger::trace(
                    Event::SourceEmbedded.as_str(),
                    &[
                        ("mode", mode.as_str()),
                        ("proxy", proxy.to_string().as_str()),
                        ("source", reference.as_str()),
                    ],
                );
                Ok(sourced)
            }
            (SourceMode::Embedded, None) => Err(RewriteError::MalformedSource(format!(
                "Embedded source for '{}' without a root",
                reference
            ))),
        }
    }
}

fn check_type(hook: &str, original: &Expr, replacement: &Expr) -> RewriteResult<()> {
    if original.ty().is_assignable_from(replacement.ty()) {
        Ok(())
    } else {
        Err(RewriteError::TypeMismatch {
            hook: hook.to_string(),
            expected: original.ty().clone(),
            actual: replacement.ty().clone(),
        })
    }
}

/// Embedded fragments hold no queryable constant and only reference the root proxy
fn check_embedded(reference: &str, sourced: &Expr, root: ProxyId) -> RewriteResult<()> {
    if matches!(sourced.kind(), ExprKind::Constant(Constant::Queryable(_))) {
        return Err(RewriteError::MalformedSource(format!(
            "Embedded source for '{}' is a standalone queryable",
            reference
        )));
    }
    let foreign = sourced.any_node(&|e| match e.kind() {
        ExprKind::Native(native) => native.proxy != root,
        _ => false,
    });
    if foreign {
        return Err(RewriteError::MalformedSource(format!(
            "Embedded source for '{}' references a foreign proxy",
            reference
        )));
    }
    Ok(())
}

//! Rewrite Context
//!
//! Per-request mutable state of a tree walk: the stack of visited
//! node/binding frames, the substitution frames installed while a filter
//! result is re-walked, the root queryable once sourced and the running
//! originating collection.
//!
//! Created once per request and discarded when the engine returns.

use std::sync::Arc;

use crate::binding::{ModelBinding, UnknownSource};
use crate::core::RequestContext;
use crate::expr::{Expr, ExprKind, NativeQueryable, NodeId};
use crate::schema::SchemaModel;

use super::errors::{RewriteError, RewriteResult};
use super::hooks::HookRegistry;

/// Default limit on nested frames
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A visited node and its binding. Unbound frames carry no node.
#[derive(Debug, Clone)]
pub struct Frame {
    node: Option<Expr>,
    binding: ModelBinding,
}

impl Frame {
    pub fn node(&self) -> Option<&Expr> {
        self.node.as_ref()
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }
}

/// Per-request walk state
pub struct RewriteContext<'a> {
    model: &'a SchemaModel,
    hooks: &'a HookRegistry,
    request: &'a RequestContext,
    max_depth: usize,
    frames: Vec<Frame>,
    /// Original node → accumulated replacement, innermost last
    substitutions: Vec<(NodeId, Expr)>,
    root: Option<Arc<dyn NativeQueryable>>,
    originating_collection: Option<String>,
    sourcing_calls: usize,
}

impl<'a> RewriteContext<'a> {
    pub fn new(model: &'a SchemaModel, hooks: &'a HookRegistry, request: &'a RequestContext) -> Self {
        Self {
            model,
            hooks,
            request,
            max_depth: DEFAULT_MAX_DEPTH,
            frames: Vec::new(),
            substitutions: Vec::new(),
            root: None,
            originating_collection: None,
            sourcing_calls: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    // ---- accessors ----

    pub fn model(&self) -> &'a SchemaModel {
        self.model
    }

    pub fn hooks(&self) -> &'a HookRegistry {
        self.hooks
    }

    pub fn request(&self) -> &'a RequestContext {
        self.request
    }

    /// Node of the current frame; `None` in an unbound frame
    pub fn node(&self) -> Option<&Expr> {
        self.frames.last().and_then(|f| f.node.as_ref())
    }

    /// Binding of the current frame
    pub fn binding(&self) -> &ModelBinding {
        static UNBOUND: ModelBinding = ModelBinding::None;
        self.frames.last().map(|f| &f.binding).unwrap_or(&UNBOUND)
    }

    /// Frames below the current one, innermost first
    pub fn parents(&self) -> impl Iterator<Item = &Frame> {
        let below = self.frames.len().saturating_sub(1);
        self.frames[..below].iter().rev()
    }

    /// Whether the current frame lies inside a lambda body
    pub fn in_lambda_body(&self) -> bool {
        self.parents()
            .filter_map(Frame::node)
            .any(|n| matches!(n.kind(), ExprKind::Lambda { .. }))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The root queryable, once the first data reference has been sourced
    pub fn root(&self) -> Option<&Arc<dyn NativeQueryable>> {
        self.root.as_ref()
    }

    pub fn originating_collection(&self) -> Option<&str> {
        self.originating_collection.as_deref()
    }

    /// Number of sourcer invocations so far
    pub fn sourcing_calls(&self) -> usize {
        self.sourcing_calls
    }

    /// Consume the context, yielding the root and originating collection
    pub fn finish(self) -> (Option<Arc<dyn NativeQueryable>>, Option<String>) {
        (self.root, self.originating_collection)
    }

    // ---- frames ----

    /// Enter a frame. `None` pushes an unbound frame.
    pub fn push(&mut self, node: Option<&Expr>) -> RewriteResult<()> {
        if self.frames.len() >= self.max_depth {
            return Err(RewriteError::DepthExceeded(self.max_depth));
        }
        let binding = match node {
            Some(node) => self.bind(node, self.frames.len())?,
            None => ModelBinding::None,
        };
        self.frames.push(Frame {
            node: node.cloned(),
            binding,
        });
        Ok(())
    }

    /// Replace the current frame's node, re-deriving its binding
    pub fn replace(&mut self, node: Expr) -> RewriteResult<()> {
        let depth = self.frames.len().saturating_sub(1);
        let binding = self.bind(&node, depth)?;
        match self.frames.last_mut() {
            Some(frame) => {
                frame.node = Some(node);
                frame.binding = binding;
                Ok(())
            }
            None => self.push(Some(&node)),
        }
    }

    /// Leave the current frame.
    ///
    /// When frames remain, the left binding's owning collection becomes the
    /// originating collection candidate. Bindings without one, and frames
    /// inside a lambda body, leave the candidate unchanged.
    pub fn pop(&mut self) -> Option<Frame> {
        let in_lambda = self.in_lambda_body();
        let frame = self.frames.pop()?;
        if !self.frames.is_empty() && !in_lambda {
            if let Some(collection) = frame.binding.owning_collection(self.model) {
                self.originating_collection = Some(collection);
            }
        }
        Some(frame)
    }

    /// Run `f` inside a new frame, popping it afterwards
    pub fn nested<R>(
        &mut self,
        node: Option<&Expr>,
        f: impl FnOnce(&mut Self) -> RewriteResult<R>,
    ) -> RewriteResult<R> {
        self.push(node)?;
        let result = f(self);
        self.pop();
        result
    }

    // ---- substitutions ----

    /// Run `f` with `original` substituted by `replacement`
    pub fn with_substitution<R>(
        &mut self,
        original: NodeId,
        replacement: Expr,
        f: impl FnOnce(&mut Self) -> RewriteResult<R>,
    ) -> RewriteResult<R> {
        self.substitutions.push((original, replacement));
        let result = f(self);
        self.substitutions.pop();
        result
    }

    /// Innermost substitution installed for `id`
    pub fn substitution(&self, id: NodeId) -> Option<&Expr> {
        self.substitutions
            .iter()
            .rev()
            .find(|(original, _)| *original == id)
            .map(|(_, replacement)| replacement)
    }

    pub fn has_substitutions(&self) -> bool {
        !self.substitutions.is_empty()
    }

    // ---- sourcing state ----

    pub(crate) fn set_root(&mut self, root: Arc<dyn NativeQueryable>) {
        self.root = Some(root);
    }

    pub(crate) fn record_sourcing(&mut self) {
        self.sourcing_calls += 1;
    }

    fn bind(&self, node: &Expr, depth: usize) -> RewriteResult<ModelBinding> {
        let enclosing: Vec<&Expr> = self.frames[..depth]
            .iter()
            .filter_map(|f| f.node.as_ref())
            .collect();
        ModelBinding::bind(node, &enclosing, self.model)
            .map_err(|UnknownSource(name)| RewriteError::UnknownSource(name))
    }
}

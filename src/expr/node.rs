//! Query tree nodes
//!
//! Nodes are immutable and reference counted. A node may be reachable
//! from several parents, so rewrites key on `NodeId` (identity), never on
//! structural equality. Cloning an `Expr` shares the identity; rebuilding
//! a node with new children allocates a fresh one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::types::QueryType;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for logging
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identity of a backend instance that native fragments are relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(Uuid);

impl ProxyId {
    /// Allocate a fresh proxy identity
    pub fn new() -> Self {
        ProxyId(Uuid::new_v4())
    }
}

impl Default for ProxyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// A backend-native queryable, produced by the sourcer in root mode
pub trait NativeQueryable: fmt::Debug + Send + Sync {
    /// The backend instance this queryable belongs to
    fn proxy(&self) -> ProxyId;

    /// Element type of the rows it produces
    fn element_type(&self) -> &QueryType;

    /// The queryable's own native tree
    fn expression(&self) -> Expr;
}

/// Constant payload
#[derive(Debug, Clone)]
pub enum Constant {
    Value(Value),
    Queryable(Arc<dyn NativeQueryable>),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Value(a), Constant::Value(b)) => a == b,
            (Constant::Queryable(a), Constant::Queryable(b)) => {
                a.proxy() == b.proxy() && a.expression() == b.expression()
            }
            _ => false,
        }
    }
}

/// Canonical data reference: a named schema source, not yet resolved to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub namespace: Option<String>,
    pub name: String,
    pub args: Vec<Expr>,
}

impl SourceRef {
    /// Qualified name, `namespace.name` when a namespace is present
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// Backend-native data access relative to a proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSource {
    pub proxy: ProxyId,
    pub name: String,
}

/// Query operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMethod {
    Where,
    Select,
    OrderBy,
    OrderByDescending,
    Skip,
    Take,
    Count,
    First,
    Any,
}

impl QueryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMethod::Where => "where",
            QueryMethod::Select => "select",
            QueryMethod::OrderBy => "order_by",
            QueryMethod::OrderByDescending => "order_by_descending",
            QueryMethod::Skip => "skip",
            QueryMethod::Take => "take",
            QueryMethod::Count => "count",
            QueryMethod::First => "first",
            QueryMethod::Any => "any",
        }
    }

    /// Returns true for `skip` and `take`
    pub fn is_paging(&self) -> bool {
        matches!(self, QueryMethod::Skip | QueryMethod::Take)
    }

    /// Static result type of a call with the given arguments
    fn result_type(&self, args: &[Expr]) -> QueryType {
        let source = args.first().map(|a| a.ty().clone()).unwrap_or(QueryType::Any);
        match self {
            QueryMethod::Where
            | QueryMethod::OrderBy
            | QueryMethod::OrderByDescending
            | QueryMethod::Skip
            | QueryMethod::Take => source,
            QueryMethod::Select => {
                let projected = args.get(1).map(|l| l.ty().clone()).unwrap_or(QueryType::Any);
                match source {
                    QueryType::Sequence(_) => QueryType::sequence(projected),
                    _ => QueryType::queryable(projected),
                }
            }
            QueryMethod::Count => QueryType::Int,
            QueryMethod::Any => QueryType::Bool,
            QueryMethod::First => source.element_type().cloned().unwrap_or(QueryType::Any),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Constant),
    Parameter(String),
    Member { target: Expr, name: String },
    Source(SourceRef),
    Native(NativeSource),
    Call { method: QueryMethod, args: Vec<Expr> },
    Lambda { param: String, body: Expr },
    Binary { op: BinaryOp, left: Expr, right: Expr },
    Not(Expr),
}

#[derive(Debug)]
struct ExprNode {
    id: NodeId,
    ty: QueryType,
    kind: ExprKind,
}

/// Shared handle to an immutable query tree node
#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    /// Create a node with an explicit static type
    pub fn new(kind: ExprKind, ty: QueryType) -> Self {
        Expr(Arc::new(ExprNode {
            id: NodeId::next(),
            ty,
            kind,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn ty(&self) -> &QueryType {
        &self.0.ty
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Identity comparison
    pub fn is_same(&self, other: &Expr) -> bool {
        self.0.id == other.0.id
    }

    // ---- constructors ----

    /// JSON scalar constant; the type follows the value
    pub fn constant(value: Value) -> Self {
        let ty = match &value {
            Value::Bool(_) => QueryType::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => QueryType::Int,
            Value::Number(_) => QueryType::Float,
            Value::String(_) => QueryType::String,
            _ => QueryType::Any,
        };
        Self::new(ExprKind::Constant(Constant::Value(value)), ty)
    }

    /// Constant wrapping a native queryable (root sourcing result)
    pub fn queryable(queryable: Arc<dyn NativeQueryable>) -> Self {
        let ty = QueryType::queryable(queryable.element_type().clone());
        Self::new(ExprKind::Constant(Constant::Queryable(queryable)), ty)
    }

    pub fn parameter(name: impl Into<String>, ty: QueryType) -> Self {
        Self::new(ExprKind::Parameter(name.into()), ty)
    }

    pub fn member(target: Expr, name: impl Into<String>, ty: QueryType) -> Self {
        Self::new(
            ExprKind::Member {
                target,
                name: name.into(),
            },
            ty,
        )
    }

    /// Unqualified data reference without arguments
    pub fn source(name: impl Into<String>, ty: QueryType) -> Self {
        Self::source_ref(
            SourceRef {
                namespace: None,
                name: name.into(),
                args: Vec::new(),
            },
            ty,
        )
    }

    pub fn source_ref(source: SourceRef, ty: QueryType) -> Self {
        Self::new(ExprKind::Source(source), ty)
    }

    pub fn native(source: NativeSource, ty: QueryType) -> Self {
        Self::new(ExprKind::Native(source), ty)
    }

    /// Lambda; its static type is the type of its body
    pub fn lambda(param: impl Into<String>, body: Expr) -> Self {
        let ty = body.ty().clone();
        Self::new(
            ExprKind::Lambda {
                param: param.into(),
                body,
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary { op, left, right }, QueryType::Bool)
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn not(operand: Expr) -> Self {
        Self::new(ExprKind::Not(operand), QueryType::Bool)
    }

    /// Query operator call; the type is derived from the arguments
    pub fn call(method: QueryMethod, args: Vec<Expr>) -> Self {
        let ty = method.result_type(&args);
        Self::new(ExprKind::Call { method, args }, ty)
    }

    // ---- fluent query operators ----

    pub fn filter(self, predicate: Expr) -> Self {
        Self::call(QueryMethod::Where, vec![self, predicate])
    }

    pub fn select(self, projection: Expr) -> Self {
        Self::call(QueryMethod::Select, vec![self, projection])
    }

    pub fn order_by(self, key: Expr) -> Self {
        Self::call(QueryMethod::OrderBy, vec![self, key])
    }

    pub fn order_by_descending(self, key: Expr) -> Self {
        Self::call(QueryMethod::OrderByDescending, vec![self, key])
    }

    pub fn skip(self, n: u64) -> Self {
        Self::call(QueryMethod::Skip, vec![self, Expr::constant(Value::from(n))])
    }

    pub fn take(self, n: u64) -> Self {
        Self::call(QueryMethod::Take, vec![self, Expr::constant(Value::from(n))])
    }

    pub fn count(self) -> Self {
        Self::call(QueryMethod::Count, vec![self])
    }

    pub fn first(self) -> Self {
        Self::call(QueryMethod::First, vec![self])
    }

    pub fn any(self) -> Self {
        Self::call(QueryMethod::Any, vec![self])
    }

    // ---- structure ----

    /// Direct children, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Constant(_) | ExprKind::Parameter(_) | ExprKind::Native(_) => Vec::new(),
            ExprKind::Member { target, .. } => vec![target],
            ExprKind::Source(source) => source.args.iter().collect(),
            ExprKind::Call { args, .. } => args.iter().collect(),
            ExprKind::Lambda { body, .. } => vec![body],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Not(operand) => vec![operand],
        }
    }

    /// Rebuild this node over new children, keeping its static type.
    ///
    /// Returns `self` unchanged when every child is identical.
    pub fn with_children(&self, children: Vec<Expr>) -> Expr {
        let current = self.children();
        debug_assert_eq!(current.len(), children.len());
        if current.len() == children.len()
            && current.iter().zip(&children).all(|(a, b)| a.is_same(b))
        {
            return self.clone();
        }

        let mut it = children.into_iter();
        let mut next = |fallback: &Expr| it.next().unwrap_or_else(|| fallback.clone());

        let kind = match self.kind() {
            ExprKind::Constant(_) | ExprKind::Parameter(_) | ExprKind::Native(_) => {
                return self.clone();
            }
            ExprKind::Member { target, name } => ExprKind::Member {
                target: next(target),
                name: name.clone(),
            },
            ExprKind::Source(source) => ExprKind::Source(SourceRef {
                namespace: source.namespace.clone(),
                name: source.name.clone(),
                args: source.args.iter().map(|a| next(a)).collect(),
            }),
            ExprKind::Call { method, args } => ExprKind::Call {
                method: *method,
                args: args.iter().map(|a| next(a)).collect(),
            },
            ExprKind::Lambda { param, body } => ExprKind::Lambda {
                param: param.clone(),
                body: next(body),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: next(left),
                right: next(right),
            },
            ExprKind::Not(operand) => ExprKind::Not(next(operand)),
        };

        Expr::new(kind, self.ty().clone())
    }

    /// Returns true if this node or any descendant satisfies `pred`
    pub fn any_node(&self, pred: &dyn Fn(&Expr) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any_node(pred))
    }

    /// Visit this node and every descendant, pre-order
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Returns true if any data reference remains in the tree
    pub fn has_data_reference(&self) -> bool {
        self.any_node(&|e| matches!(e.kind(), ExprKind::Source(_)))
    }

    /// Strip the outermost `skip`/`take` operators
    pub fn strip_paging(&self) -> Expr {
        let mut current = self.clone();
        loop {
            let inner = match current.kind() {
                ExprKind::Call { method, args } if method.is_paging() => args.first().cloned(),
                _ => None,
            };
            match inner {
                Some(inner) => current = inner,
                None => return current,
            }
        }
    }
}

impl PartialEq for Expr {
    /// Structural equality, ignoring identity
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) || (self.ty() == other.ty() && self.kind() == other.kind())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr#{}({}: {})", self.id().value(), self, self.ty())
    }
}

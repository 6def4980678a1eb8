//! Query tree interpreter over JSON rows
//!
//! Evaluates a fully sourced tree. Sequences are JSON arrays, rows are
//! JSON objects. Comparisons never coerce: values of different kinds are
//! unequal and unordered, and null never satisfies a range comparison.

use std::cmp::Ordering;

use serde_json::Value;

use super::memory::MemoryStore;
use crate::core::{CoreError, CoreResult};
use crate::expr::{BinaryOp, Constant, Expr, ExprKind, QueryMethod};

/// Lambda parameter bindings, innermost last
type Scope = Vec<(String, Value)>;

/// Evaluates query trees against one store
pub struct Evaluator<'s> {
    store: &'s MemoryStore,
}

impl<'s> Evaluator<'s> {
    pub fn new(store: &'s MemoryStore) -> Self {
        Self { store }
    }

    pub fn evaluate(&self, expr: &Expr) -> CoreResult<Value> {
        self.eval(expr, &mut Scope::new())
    }

    fn eval(&self, expr: &Expr, scope: &mut Scope) -> CoreResult<Value> {
        match expr.kind() {
            ExprKind::Constant(Constant::Value(v)) => Ok(v.clone()),
            ExprKind::Constant(Constant::Queryable(q)) => self.eval(&q.expression(), scope),
            ExprKind::Parameter(name) => scope
                .iter()
                .rev()
                .find(|(param, _)| param == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| CoreError::execution(format!("Unbound parameter '{}'", name))),
            ExprKind::Member { target, name } => match self.eval(target, scope)? {
                Value::Object(mut fields) => Ok(fields.remove(name).unwrap_or(Value::Null)),
                Value::Null => Ok(Value::Null),
                other => Err(CoreError::execution(format!(
                    "Cannot access '{}' on {}",
                    name, other
                ))),
            },
            ExprKind::Source(source) => Err(CoreError::execution(format!(
                "Data reference '{}' was not sourced",
                source.qualified_name()
            ))),
            ExprKind::Native(native) => {
                if native.proxy != self.store.proxy() {
                    return Err(CoreError::execution(format!(
                        "'{}' belongs to another store",
                        native.name
                    )));
                }
                let rows = self.store.rows(&native.name).ok_or_else(|| {
                    CoreError::execution(format!("No rows stored for '{}'", native.name))
                })?;
                if expr.ty().is_collection() {
                    Ok(Value::Array(rows.to_vec()))
                } else {
                    Ok(rows.first().cloned().unwrap_or(Value::Null))
                }
            }
            ExprKind::Call { method, args } => self.call(*method, args, scope),
            ExprKind::Lambda { .. } => Err(CoreError::execution("Lambda outside a query operator")),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, scope),
            ExprKind::Not(operand) => Ok(Value::Bool(!truthy(&self.eval(operand, scope)?))),
        }
    }

    fn call(&self, method: QueryMethod, args: &[Expr], scope: &mut Scope) -> CoreResult<Value> {
        let source = args
            .first()
            .ok_or_else(|| CoreError::execution(format!("'{}' without a source", method.as_str())))?;
        let items = match self.eval(source, scope)? {
            Value::Array(items) => items,
            other => {
                return Err(CoreError::execution(format!(
                    "'{}' applied to a non-sequence: {}",
                    method.as_str(),
                    other
                )))
            }
        };
        let argument = || {
            args.get(1)
                .ok_or_else(|| CoreError::execution(format!("'{}' needs an argument", method.as_str())))
        };

        match method {
            QueryMethod::Where => {
                let predicate = argument()?;
                let mut kept = Vec::new();
                for item in items {
                    if truthy(&self.apply(predicate, item.clone(), scope)?) {
                        kept.push(item);
                    }
                }
                Ok(Value::Array(kept))
            }
            QueryMethod::Select => {
                let projection = argument()?;
                let mut projected = Vec::with_capacity(items.len());
                for item in items {
                    projected.push(self.apply(projection, item, scope)?);
                }
                Ok(Value::Array(projected))
            }
            QueryMethod::OrderBy | QueryMethod::OrderByDescending => {
                let selector = argument()?;
                let mut keyed = Vec::with_capacity(items.len());
                for item in items {
                    keyed.push((self.apply(selector, item.clone(), scope)?, item));
                }
                // stable, so earlier orderings survive as tie-breakers
                keyed.sort_by(|(a, _), (b, _)| {
                    let ordering = compare_values(a, b);
                    match method {
                        QueryMethod::OrderByDescending => ordering.reverse(),
                        _ => ordering,
                    }
                });
                Ok(Value::Array(keyed.into_iter().map(|(_, item)| item).collect()))
            }
            QueryMethod::Skip | QueryMethod::Take => {
                let n = self.eval(argument()?, scope)?;
                let n = n.as_u64().ok_or_else(|| {
                    CoreError::execution(format!("'{}' count is not a number: {}", method.as_str(), n))
                })? as usize;
                let page: Vec<Value> = match method {
                    QueryMethod::Skip => items.into_iter().skip(n).collect(),
                    _ => items.into_iter().take(n).collect(),
                };
                Ok(Value::Array(page))
            }
            QueryMethod::Count => Ok(Value::from(items.len() as u64)),
            QueryMethod::First => Ok(items.into_iter().next().unwrap_or(Value::Null)),
            QueryMethod::Any => Ok(Value::Bool(!items.is_empty())),
        }
    }

    /// Apply a one-parameter lambda to `item`
    fn apply(&self, lambda: &Expr, item: Value, scope: &mut Scope) -> CoreResult<Value> {
        let (param, body) = match lambda.kind() {
            ExprKind::Lambda { param, body } => (param, body),
            _ => return Err(CoreError::execution(format!("Expected a lambda, got {}", lambda))),
        };
        scope.push((param.clone(), item));
        let result = self.eval(body, scope);
        scope.pop();
        result
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr, scope: &mut Scope) -> CoreResult<Value> {
        match op {
            BinaryOp::And => {
                let result = truthy(&self.eval(left, scope)?) && truthy(&self.eval(right, scope)?);
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = truthy(&self.eval(left, scope)?) || truthy(&self.eval(right, scope)?);
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let a = self.eval(left, scope)?;
        let b = self.eval(right, scope)?;
        let result = match op {
            BinaryOp::Eq => values_equal(&a, &b),
            BinaryOp::Ne => !values_equal(&a, &b),
            BinaryOp::Lt => range_compare(&a, &b) == Some(Ordering::Less),
            BinaryOp::Le => matches!(range_compare(&a, &b), Some(Ordering::Less | Ordering::Equal)),
            BinaryOp::Gt => range_compare(&a, &b) == Some(Ordering::Greater),
            BinaryOp::Ge => {
                matches!(range_compare(&a, &b), Some(Ordering::Greater | Ordering::Equal))
            }
            BinaryOp::And | BinaryOp::Or => false,
        };
        Ok(Value::Bool(result))
    }
}

fn truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

/// Exact equality; numbers compare by value
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering for range comparisons: same-kind numbers or strings only
fn range_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total ordering used for sorting.
///
/// null < bool < number < string < array < object; arrays and objects
/// compare equal among themselves.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

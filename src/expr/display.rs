//! Human-readable rendering of query trees
//!
//! Used by explain output, log fields and test diagnostics:
//!
//! ```text
//! native(Customers).where(it => (it.Status == "active")).take(10)
//! ```

use std::fmt;

use super::node::{Constant, Expr, ExprKind};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant(Constant::Value(v)) => write!(f, "{}", v),
            ExprKind::Constant(Constant::Queryable(q)) => {
                write!(f, "const({})", q.expression())
            }
            ExprKind::Parameter(name) => write!(f, "{}", name),
            ExprKind::Member { target, name } => write!(f, "{}.{}", target, name),
            ExprKind::Source(source) => {
                write!(f, "source({}", source.qualified_name())?;
                for arg in &source.args {
                    write!(f, ", {}", arg)?;
                }
                write!(f, ")")
            }
            ExprKind::Native(native) => write!(f, "native({})", native.name),
            ExprKind::Call { method, args } => {
                match args.split_first() {
                    Some((source, rest)) => {
                        write!(f, "{}.{}(", source, method.as_str())?;
                        for (i, arg) in rest.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", arg)?;
                        }
                    }
                    None => write!(f, "{}(", method.as_str())?,
                }
                write!(f, ")")
            }
            ExprKind::Lambda { param, body } => write!(f, "{} => {}", param, body),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            ExprKind::Not(operand) => write!(f, "!{}", operand),
        }
    }
}

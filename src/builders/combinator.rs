//! AND / OR combinator over boolean expressions.
//!
//! ```ignore
//! criteria.op(Operator::Gt, 30)
//!     .and(other)
//!     .or([a, b])        // a OR b, then OR-ed onto the chain
//!     .and(c)
//! ```

use crate::ast::{Expr, LogicalOp};

use super::functions::ScalarFn;

/// A boolean expression that can be chained with `and` / `or`.
#[derive(Debug, Clone, PartialEq)]
pub enum Combinable {
    Leaf(Expr),
    Combined {
        op: LogicalOp,
        left: Box<Combinable>,
        right: Box<Combinable>,
    },
}

/// Right-hand side of `and` / `or`: one expression or a list folded with the same operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    One(Combinable),
    Many(Vec<Combinable>),
}

impl Combinable {
    pub fn leaf(expr: Expr) -> Self {
        Combinable::Leaf(expr)
    }

    pub fn and(self, other: impl Into<Branch>) -> Self {
        self.join(LogicalOp::And, other.into())
    }

    pub fn or(self, other: impl Into<Branch>) -> Self {
        self.join(LogicalOp::Or, other.into())
    }

    fn join(self, op: LogicalOp, branch: Branch) -> Self {
        let right = match branch {
            Branch::One(one) => one,
            Branch::Many(items) => match fold(op, items) {
                Some(folded) => folded,
                None => return self,
            },
        };
        Combinable::Combined {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Lower into an expression tree. Left-leaning chains of one operator become one n-ary node.
    fn lower(self) -> Expr {
        match self {
            Combinable::Leaf(expr) => expr,
            Combinable::Combined { op, left, right } => {
                let mut operands = match left.lower() {
                    Expr::Logical {
                        op: inner,
                        operands,
                    } if inner == op && operands.len() > 1 => operands,
                    other => vec![other],
                };
                operands.push(right.lower());
                Expr::Logical { op, operands }
            }
        }
    }
}

fn fold(op: LogicalOp, items: Vec<Combinable>) -> Option<Combinable> {
    items.into_iter().reduce(|acc, next| Combinable::Combined {
        op,
        left: Box::new(acc),
        right: Box::new(next),
    })
}

/// Extract the raw node from a builder result. Plain expressions pass through unchanged.
pub trait IntoNode {
    fn into_node(self) -> Expr;
}

impl IntoNode for Expr {
    fn into_node(self) -> Expr {
        self
    }
}

impl IntoNode for Combinable {
    fn into_node(self) -> Expr {
        self.lower()
    }
}

impl IntoNode for ScalarFn {
    fn into_node(self) -> Expr {
        ScalarFn::into_node(self)
    }
}

impl From<Expr> for Combinable {
    fn from(expr: Expr) -> Self {
        Combinable::Leaf(expr)
    }
}

impl From<Combinable> for Expr {
    fn from(c: Combinable) -> Self {
        c.lower()
    }
}

impl From<Combinable> for Branch {
    fn from(c: Combinable) -> Self {
        Branch::One(c)
    }
}

impl From<Expr> for Branch {
    fn from(expr: Expr) -> Self {
        Branch::One(Combinable::Leaf(expr))
    }
}

impl From<Vec<Combinable>> for Branch {
    fn from(items: Vec<Combinable>) -> Self {
        Branch::Many(items)
    }
}

impl<const N: usize> From<[Combinable; N]> for Branch {
    fn from(items: [Combinable; N]) -> Self {
        Branch::Many(items.into())
    }
}

impl From<Vec<Expr>> for Branch {
    fn from(items: Vec<Expr>) -> Self {
        Branch::Many(items.into_iter().map(Combinable::Leaf).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Operator, col, lit};
    use crate::transpiler::ToSql;
    use pretty_assertions::assert_eq;

    fn eq(column: &str, value: i64) -> Combinable {
        Combinable::leaf(Expr::Compare {
            left: Box::new(col(column)),
            op: Operator::Eq,
            right: Box::new(lit(value)),
        })
    }

    #[test]
    fn test_and_array_is_folded_first() {
        let expr = eq("a", 1).and([eq("b", 2), eq("c", 3)]).into_node();
        assert_eq!(expr.to_sql(), "a = 1 AND (b = 2 AND c = 3)");
    }

    #[test]
    fn test_or_array_is_folded_first() {
        let expr = eq("a", 1).or([eq("b", 2), eq("c", 3)]).into_node();
        assert_eq!(expr.to_sql(), "a = 1 OR (b = 2 OR c = 3)");
    }

    #[test]
    fn test_mixed_chain_keeps_grouping() {
        let expr = eq("a", 1)
            .and(eq("x", 0))
            .or([eq("y", 1), eq("z", 2)])
            .and(eq("w", 3))
            .into_node();
        assert_eq!(
            expr.to_sql(),
            "((a = 1 AND x = 0) OR (y = 1 OR z = 2)) AND w = 3"
        );
    }

    #[test]
    fn test_same_operator_chain_flattens() {
        let expr = eq("a", 1).and(eq("b", 2)).and(eq("c", 3)).into_node();
        assert_eq!(expr.to_sql(), "a = 1 AND b = 2 AND c = 3");
    }

    #[test]
    fn test_empty_array_is_noop() {
        let expr = eq("a", 1).and(Vec::<Combinable>::new()).into_node();
        assert_eq!(expr.to_sql(), "a = 1");
    }

    #[test]
    fn test_unwrap_is_idempotent() {
        let plain = col("active");
        assert_eq!(plain.clone().into_node(), plain);

        let node = Expr::Compare {
            left: Box::new(col("a")),
            op: Operator::Eq,
            right: Box::new(lit(1)),
        };
        assert_eq!(Combinable::leaf(node.clone()).into_node(), node);
    }
}

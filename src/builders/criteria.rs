//! Per-column criteria builder.

use crate::ast::{Expr, Operator, Value, col, lit};

use super::combinator::Combinable;
use super::functions::ScalarFn;

/// One side of a comparison.
///
/// Scalar-function handles are unwrapped to their node; everything else is a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(ScalarFn),
    Literal(Value),
}

impl Operand {
    fn into_expr(self) -> Expr {
        match self {
            Operand::Scalar(f) => f.into_node(),
            Operand::Literal(v) => lit(v),
        }
    }
}

impl From<ScalarFn> for Operand {
    fn from(f: ScalarFn) -> Self {
        Operand::Scalar(f)
    }
}

macro_rules! literal_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Literal(v.into())
                }
            }
        )*
    };
}

literal_operand!(Value, bool, i32, i64, f64, &str, String);

/// Builds predicates over a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaBuilder {
    column: String,
}

impl CriteriaBuilder {
    pub fn for_column(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Scalar functions over this column.
    pub fn func(&self) -> ScalarFn {
        ScalarFn::column(&self.column)
    }

    /// column OP value
    pub fn op(&self, op: Operator, value: impl Into<Value>) -> Combinable {
        Combinable::leaf(Expr::Compare {
            left: Box::new(col(&self.column)),
            op,
            right: Box::new(lit(value)),
        })
    }

    /// column = value
    pub fn eq(&self, value: impl Into<Value>) -> Combinable {
        self.op(Operator::Eq, value)
    }

    /// lhs OP rhs, where either side may be a scalar-function chain.
    pub fn compare(
        &self,
        lhs: impl Into<Operand>,
        op: Operator,
        rhs: impl Into<Operand>,
    ) -> Combinable {
        Combinable::leaf(Expr::Compare {
            left: Box::new(lhs.into().into_expr()),
            op,
            right: Box::new(rhs.into().into_expr()),
        })
    }

    pub fn is_null(&self) -> Combinable {
        self.op(Operator::Is, Value::Null)
    }

    pub fn is_not_null(&self) -> Combinable {
        self.op(Operator::IsNot, Value::Null)
    }

    /// column IN (values...)
    pub fn in_list<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Combinable {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.op(Operator::In, Value::Array(values))
    }

    /// column BETWEEN low AND high (inclusive)
    pub fn between(&self, low: impl Into<Value>, high: impl Into<Value>) -> Combinable {
        self.range(low.into(), high.into(), false)
    }

    /// column BETWEEN SYMMETRIC a AND b; the bounds may come in either order.
    pub fn between_symmetric(&self, a: impl Into<Value>, b: impl Into<Value>) -> Combinable {
        self.range(a.into(), b.into(), true)
    }

    fn range(&self, low: Value, high: Value, symmetric: bool) -> Combinable {
        Combinable::leaf(Expr::Between {
            expr: Box::new(col(&self.column)),
            low: Box::new(lit(low)),
            high: Box::new(lit(high)),
            symmetric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::combinator::IntoNode;
    use crate::transpiler::{ParamContext, ToSql};
    use pretty_assertions::assert_eq;

    fn sql(c: Combinable) -> String {
        c.into_node().to_sql()
    }

    #[test]
    fn test_op() {
        let c = CriteriaBuilder::for_column("age");
        assert_eq!(sql(c.op(Operator::Gte, 18)), "age >= 18");
        assert_eq!(sql(c.eq(30)), "age = 30");
    }

    #[test]
    fn test_compare_scalar_chains() {
        let c = CriteriaBuilder::for_column("name");
        let expr = c.compare(c.func().lower().left(1), Operator::Eq, "a");
        assert_eq!(sql(expr), "LEFT(LOWER(name), 1) = 'a'");

        let both = c.compare(
            c.func().length(),
            Operator::Gt,
            ScalarFn::column("nickname").length(),
        );
        assert_eq!(sql(both), "LENGTH(name) > LENGTH(nickname)");
    }

    #[test]
    fn test_between_variants() {
        let c = CriteriaBuilder::for_column("salary");
        assert_eq!(sql(c.between(40000, 50000)), "salary BETWEEN 40000 AND 50000");
        assert_eq!(
            sql(c.between_symmetric(50000, 40000)),
            "salary BETWEEN SYMMETRIC 50000 AND 40000"
        );
    }

    #[test]
    fn test_null_and_list_helpers() {
        let c = CriteriaBuilder::for_column("manager_id");
        assert_eq!(sql(c.is_null()), "manager_id IS NULL");
        assert_eq!(sql(c.is_not_null()), "manager_id IS NOT NULL");
        assert_eq!(sql(c.in_list([1, 2])), "manager_id IN (1, 2)");
    }

    #[test]
    fn test_chained_criteria_bind_in_order() {
        let c = CriteriaBuilder::for_column("age");
        let expr = c
            .op(Operator::Gt, 20)
            .and(c.op(Operator::Lt, 40))
            .or([c.eq(99), c.is_null()])
            .into_node();
        let mut ctx = ParamContext::new();
        assert_eq!(
            expr.to_sql_params(&mut ctx),
            "(age > $1 AND age < $2) OR (age = $3 OR age IS NULL)"
        );
        assert_eq!(ctx.params, vec![Value::Int(20), Value::Int(40), Value::Int(99)]);
    }
}

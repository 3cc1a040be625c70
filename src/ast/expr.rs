use serde::{Deserialize, Serialize};

use super::json_path::JsonPath;
use super::operators::{BinaryOp, LogicalOp, Operator};
use super::values::Value;
use super::window::WindowClause;

/// An immutable compiled fragment.
///
/// Builders never mutate a node in place: each step consumes its input and
/// returns a new node that owns the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// All columns (*)
    Star,
    /// Column reference, optionally qualified (`table.column`)
    Column(String),
    /// Literal value, bound as a parameter when emitted with a `ParamContext`
    Literal(Value),
    /// Trusted SQL text emitted verbatim (keywords, type names, intervals)
    Raw(String),
    /// Function call (UPPER(x), COALESCE(a, b))
    Function { name: String, args: Vec<Expr> },
    /// Function with keyword-separated arguments.
    /// e.g. `SUBSTRING(x FROM 2 FOR 3)` is `[(None, x), (Some("FROM"), 2), (Some("FOR"), 3)]`
    Special {
        name: String,
        args: Vec<(Option<String>, Expr)>,
    },
    /// Binary operation (left op right)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// CAST(expr AS type)
    Cast {
        expr: Box<Expr>,
        target_type: String,
    },
    /// Comparison predicate (left OP right)
    Compare {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    /// expr BETWEEN [SYMMETRIC] low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        symmetric: bool,
    },
    /// N-ary AND / OR. Nested logical operands are parenthesized.
    Logical { op: LogicalOp, operands: Vec<Expr> },
    /// JSON navigation (col->'a'->0, or col->'a'->>0 when as_text)
    JsonAccess {
        base: Box<Expr>,
        path: JsonPath,
        as_text: bool,
    },
    /// ARRAY[a, b, ...]
    Array(Vec<Expr>),
    /// Aggregate call, optionally ordered-set (`WITHIN GROUP (ORDER BY ...)`)
    Aggregate {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
        within_group: Option<Box<Expr>>,
    },
    /// func OVER (clauses...)
    Window {
        function: Box<Expr>,
        clauses: Vec<WindowClause>,
    },
    /// expr AS alias
    Aliased { expr: Box<Expr>, alias: String },
}

impl Expr {
    /// Always-true predicate.
    pub fn always_true() -> Self {
        Expr::Literal(Value::Bool(true))
    }

    pub fn func(name: &str, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.to_string(),
            args,
        }
    }

    pub fn cast(self, target_type: &str) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            target_type: target_type.to_string(),
        }
    }

    pub fn with_alias(self, alias: &str) -> Self {
        Expr::Aliased {
            expr: Box::new(self),
            alias: alias.to_string(),
        }
    }

    /// Whether emitting this node inside an operator needs parentheses.
    pub(crate) fn is_compound(&self) -> bool {
        matches!(
            self,
            Expr::Binary { .. } | Expr::Compare { .. } | Expr::Between { .. } | Expr::Logical { .. }
        )
    }
}

/// Column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// Literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::transpiler::ToSql;
        write!(f, "{}", self.to_sql())
    }
}

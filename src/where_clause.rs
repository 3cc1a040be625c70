//! Criteria map compilation into a WHERE expression.
//!
//! Each entry targets one column and becomes one predicate; the predicates
//! are AND-ed in insertion order. An empty map compiles to `TRUE`.

use std::fmt;

use tracing::warn;

use crate::ast::{Expr, LogicalOp, Operator, Value, col, lit};
use crate::builders::{Combinable, CriteriaBuilder, IntoNode};
use crate::error::{CritError, CritResult};

type CriteriaFn = Box<dyn Fn(CriteriaBuilder) -> Combinable + Send + Sync>;

/// The condition attached to one column.
pub enum Criterion {
    /// `column = value`
    Literal(Value),
    /// `column OP value`
    Compare(Operator, Value),
    /// Built by a closure from a fresh [`CriteriaBuilder`].
    Builder(CriteriaFn),
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Criterion::Compare(op, v) => f.debug_tuple("Compare").field(op).field(v).finish(),
            Criterion::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

impl Criterion {
    fn compile(&self, column: &str) -> Expr {
        match self {
            Criterion::Literal(value) => Expr::Compare {
                left: Box::new(col(column)),
                op: Operator::Eq,
                right: Box::new(lit(value.clone())),
            },
            Criterion::Compare(op, value) => Expr::Compare {
                left: Box::new(col(column)),
                op: *op,
                right: Box::new(lit(value.clone())),
            },
            Criterion::Builder(build) => build(CriteriaBuilder::for_column(column)).into_node(),
        }
    }
}

/// Column-to-condition map, kept in insertion order.
#[derive(Debug, Default)]
pub struct CriteriaMap {
    entries: Vec<(String, Criterion)>,
}

impl CriteriaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(mut self, column: &str, criterion: Criterion) -> Self {
        self.entries.push((column.to_string(), criterion));
        self
    }

    /// column = value
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, Criterion::Literal(value.into()))
    }

    /// column OP value
    pub fn op(self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.insert(column, Criterion::Compare(op, value.into()))
    }

    /// Predicate built from the column's [`CriteriaBuilder`].
    pub fn with<F>(self, column: &str, build: F) -> Self
    where
        F: Fn(CriteriaBuilder) -> Combinable + Send + Sync + 'static,
    {
        self.insert(column, Criterion::Builder(Box::new(build)))
    }

    /// Read a criteria map from a JSON object.
    ///
    /// `{"age": 30}` is an equality, `{"age": [">=", 18]}` an operator pair.
    pub fn from_json(json: &serde_json::Value) -> CritResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            CritError::criterion("*", "criteria must be a JSON object")
        })?;

        let mut map = Self::new();
        for (column, value) in object {
            let criterion = match value {
                serde_json::Value::Array(pair) => parse_pair(column, pair)?,
                other => Criterion::Literal(Value::from_json(other)),
            };
            map = map.insert(column, criterion);
        }
        Ok(map)
    }

    /// Compile every entry and AND them together.
    pub fn compile(&self) -> Expr {
        match self.entries.as_slice() {
            [] => Expr::always_true(),
            [(column, criterion)] => criterion.compile(column),
            entries => Expr::Logical {
                op: LogicalOp::And,
                operands: entries
                    .iter()
                    .map(|(column, criterion)| criterion.compile(column))
                    .collect(),
            },
        }
    }
}

fn parse_pair(column: &str, pair: &[serde_json::Value]) -> CritResult<Criterion> {
    let (op, value) = match pair {
        [serde_json::Value::String(op), value] => (op, value),
        _ => {
            warn!(column, "criterion array is not an [operator, value] pair");
            return Err(CritError::criterion(
                column,
                "expected an [operator, value] pair",
            ));
        }
    };
    let op: Operator = op.parse().map_err(|_| {
        warn!(column, operator = %op, "unknown operator in criteria");
        CritError::criterion(column, format!("unknown operator '{}'", op))
    })?;
    let value = match value {
        serde_json::Value::Array(items) if op.is_list() => {
            Value::Array(items.iter().map(Value::from_json).collect())
        }
        other => Value::from_json(other),
    };
    Ok(Criterion::Compare(op, value))
}

impl<F> FromIterator<(String, F)> for CriteriaMap
where
    F: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (String, F)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (column, value)| map.eq(&column, value))
    }
}

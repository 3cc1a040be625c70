//! Fluent builders producing [`Expr`](crate::ast::Expr) nodes.
//!
//! - [`ScalarFn`]: scalar function chains (`UPPER`, `ROUND`, `DATE_PART`, ...)
//! - [`CriteriaBuilder`]: per-column predicates
//! - [`Combinable`]: `and` / `or` chaining
//! - [`AggregateCatalog`]: aggregates with schema-checked columns
//! - [`WindowBuilder`]: `OVER (...)` clauses, ordered by type state

pub mod aggregates;
pub mod combinator;
pub mod criteria;
pub mod functions;
pub mod window;

pub use aggregates::{
    AggregateCatalog, AggregateChain, Fractions, NumericCast, OrderedSetChain, RankingChain,
};
pub use combinator::{Branch, Combinable, IntoNode};
pub use criteria::{CriteriaBuilder, Operand};
pub use functions::{ConversionType, DateUnit, ScalarFn};
pub use window::{
    Excluded, Framed, Fresh, OrderKey, Ordered, Partitioned, WindowBuilder, WindowState,
};

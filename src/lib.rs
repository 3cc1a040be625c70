//! # critql
//!
//! Criteria, aggregate and window-function expression compiler for PostgreSQL.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use critql::prelude::*;
//!
//! let employees = TableSchema::new("employees")
//!     .column("salary", ColumnType::Numeric)
//!     .column("is_active", ColumnType::Boolean);
//!
//! let agg = AggregateCatalog::for_table(&employees);
//! let running = agg
//!     .sum("salary")?
//!     .over()
//!     .order_by(["salary"])?
//!     .rows(FrameSpec::from_tuples(("preceding", Some(1)), ("current row", None))?)
//!     .alias("pair_sum");
//!
//! assert_eq!(
//!     running.to_sql(),
//!     "CAST(SUM(salary) OVER (ORDER BY salary ASC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW) AS float8) AS pair_sum"
//! );
//! ```
//!
//! ## Layers
//!
//! | Module         | Role                                              |
//! |----------------|---------------------------------------------------|
//! | `ast`          | Expression nodes, literals, schemas, JSON paths   |
//! | `builders`     | Scalar, criteria, combinator, aggregate, window   |
//! | `where_clause` | Criteria map to WHERE expression                  |
//! | `transpiler`   | SQL emission with inline or `$n` parameters       |
//! | `engine`       | `select_where` / `update_where` / `delete_where`  |

pub mod ast;
pub mod builders;
pub mod config;
pub mod engine;
pub mod error;
pub mod transpiler;
pub mod where_clause;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::builders::{
        AggregateCatalog, AggregateChain, Combinable, ConversionType, CriteriaBuilder, DateUnit,
        Fractions, IntoNode, NumericCast, OrderKey, OrderedSetChain, ScalarFn, WindowBuilder,
    };
    pub use crate::config::Config;
    pub use crate::engine::{Query, RowMap, Selection, Table};
    pub use crate::error::*;
    pub use crate::transpiler::{ParamContext, ToSql};
    pub use crate::where_clause::{CriteriaMap, Criterion};
}

/// Compile a criteria map into a WHERE expression.
///
/// # Example
///
/// ```
/// use critql::prelude::*;
///
/// let criteria = CriteriaMap::new().eq("is_active", true).op("salary", Operator::Gt, 45000);
/// assert_eq!(critql::compile(&criteria).to_sql(), "is_active = TRUE AND salary > 45000");
/// ```
pub fn compile(criteria: &where_clause::CriteriaMap) -> ast::Expr {
    criteria.compile()
}

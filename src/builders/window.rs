//! Window builder.
//!
//! Clauses are accumulated in canonical order: `PARTITION BY`, `ORDER BY`,
//! frame, `EXCLUDE`. The state parameter only exposes the transitions that
//! keep that order, so `order_by(..).partition_by(..)` or a second `rows`
//! does not compile.
//!
//! ```ignore
//! agg.sum("salary")?
//!     .over()
//!     .partition_by(["is_active"])?
//!     .order_by(["salary"])?
//!     .rows(FrameSpec::whole())
//!     .exclude(ExcludeOption::CurrentRow)
//!     .alias("others_total")
//! ```

use std::marker::PhantomData;

use crate::ast::{
    ColumnArg, ExcludeOption, Expr, FrameSpec, FrameUnit, SortOrder, TableSchema, WindowClause,
};
use crate::error::{CritError, CritResult};

use super::aggregates::{Extract, NumericCast, apply_cast, resolve};

mod sealed {
    pub trait Sealed {}
}

/// Marker for a window builder state.
pub trait WindowState: sealed::Sealed {}

/// `OVER ()`, nothing added yet.
#[derive(Debug, Clone, Copy)]
pub struct Fresh;
/// After `PARTITION BY`.
#[derive(Debug, Clone, Copy)]
pub struct Partitioned;
/// After `ORDER BY`.
#[derive(Debug, Clone, Copy)]
pub struct Ordered;
/// After a `ROWS` / `RANGE` / `GROUPS` frame.
#[derive(Debug, Clone, Copy)]
pub struct Framed;
/// After `EXCLUDE`.
#[derive(Debug, Clone, Copy)]
pub struct Excluded;

macro_rules! states {
    ($($state:ty),*) => {
        $(
            impl sealed::Sealed for $state {}
            impl WindowState for $state {}
        )*
    };
}

states!(Fresh, Partitioned, Ordered, Framed, Excluded);

/// A sort key for `ORDER BY`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub column: ColumnArg,
    pub order: SortOrder,
}

impl From<&str> for OrderKey {
    fn from(column: &str) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }
}

impl From<ColumnArg> for OrderKey {
    fn from(column: ColumnArg) -> Self {
        Self {
            column,
            order: SortOrder::Asc,
        }
    }
}

impl From<(&str, SortOrder)> for OrderKey {
    fn from((column, order): (&str, SortOrder)) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }
}

impl From<(ColumnArg, SortOrder)> for OrderKey {
    fn from((column, order): (ColumnArg, SortOrder)) -> Self {
        Self { column, order }
    }
}

/// Window over an aggregate or ranking function.
#[derive(Debug, Clone)]
pub struct WindowBuilder<'a, S: WindowState> {
    table: &'a TableSchema,
    function: Expr,
    cast: Option<NumericCast>,
    clauses: Vec<WindowClause>,
    _state: PhantomData<S>,
}

impl<'a> WindowBuilder<'a, Fresh> {
    pub(crate) fn new(table: &'a TableSchema, function: Expr, cast: Option<NumericCast>) -> Self {
        Self {
            table,
            function,
            cast,
            clauses: Vec::new(),
            _state: PhantomData,
        }
    }

    /// PARTITION BY columns. JSON columns need a path.
    pub fn partition_by<C: Into<ColumnArg>>(
        self,
        columns: impl IntoIterator<Item = C>,
    ) -> CritResult<WindowBuilder<'a, Partitioned>> {
        let mut exprs = Vec::new();
        for column in columns {
            let resolved = resolve(self.table, "partition_by", &column.into(), Extract::Json, true)?;
            exprs.push(resolved.expr);
        }
        if exprs.is_empty() {
            return Err(CritError::EmptyClause("partition_by"));
        }
        Ok(self.push(WindowClause::PartitionBy(exprs)))
    }

    pub fn order_by<K: Into<OrderKey>>(
        self,
        keys: impl IntoIterator<Item = K>,
    ) -> CritResult<WindowBuilder<'a, Ordered>> {
        self.ordered(keys)
    }

    /// ROWS frame without an ordering (peers are the whole partition).
    pub fn rows(self, spec: FrameSpec) -> WindowBuilder<'a, Framed> {
        self.frame(FrameUnit::Rows, spec)
    }
}

impl<'a> WindowBuilder<'a, Partitioned> {
    pub fn order_by<K: Into<OrderKey>>(
        self,
        keys: impl IntoIterator<Item = K>,
    ) -> CritResult<WindowBuilder<'a, Ordered>> {
        self.ordered(keys)
    }

    pub fn rows(self, spec: FrameSpec) -> WindowBuilder<'a, Framed> {
        self.frame(FrameUnit::Rows, spec)
    }
}

impl<'a> WindowBuilder<'a, Ordered> {
    pub fn rows(self, spec: FrameSpec) -> WindowBuilder<'a, Framed> {
        self.frame(FrameUnit::Rows, spec)
    }

    /// RANGE frame; offsets are measured on the ORDER BY value.
    pub fn range(self, spec: FrameSpec) -> WindowBuilder<'a, Framed> {
        self.frame(FrameUnit::Range, spec)
    }

    /// GROUPS frame; offsets count peer groups.
    pub fn groups(self, spec: FrameSpec) -> WindowBuilder<'a, Framed> {
        self.frame(FrameUnit::Groups, spec)
    }
}

impl<'a> WindowBuilder<'a, Framed> {
    pub fn exclude(self, option: ExcludeOption) -> WindowBuilder<'a, Excluded> {
        self.push(WindowClause::Exclude(option))
    }
}

impl<'a, S: WindowState> WindowBuilder<'a, S> {
    fn push<T: WindowState>(mut self, clause: WindowClause) -> WindowBuilder<'a, T> {
        self.clauses.push(clause);
        WindowBuilder {
            table: self.table,
            function: self.function,
            cast: self.cast,
            clauses: self.clauses,
            _state: PhantomData,
        }
    }

    fn ordered<K: Into<OrderKey>>(
        self,
        keys: impl IntoIterator<Item = K>,
    ) -> CritResult<WindowBuilder<'a, Ordered>> {
        let mut resolved_keys = Vec::new();
        for key in keys {
            let key = key.into();
            let resolved = resolve(self.table, "order_by", &key.column, Extract::Json, true)?;
            resolved_keys.push((resolved.expr, key.order));
        }
        if resolved_keys.is_empty() {
            return Err(CritError::EmptyClause("order_by"));
        }
        Ok(self.push(WindowClause::OrderBy(resolved_keys)))
    }

    fn frame(self, unit: FrameUnit, spec: FrameSpec) -> WindowBuilder<'a, Framed> {
        self.push(WindowClause::Frame { unit, spec })
    }

    pub fn clauses(&self) -> &[WindowClause] {
        &self.clauses
    }

    /// Finish as `... OVER (...) AS alias`.
    pub fn alias(self, name: &str) -> Expr {
        self.into_node().with_alias(name)
    }

    pub fn into_node(self) -> Expr {
        let window = Expr::Window {
            function: Box::new(self.function),
            clauses: self.clauses,
        };
        apply_cast(window, self.cast)
    }
}

impl<S: WindowState> From<WindowBuilder<'_, S>> for Expr {
    fn from(builder: WindowBuilder<'_, S>) -> Self {
        builder.into_node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Boundary, ColumnType};
    use crate::builders::aggregates::AggregateCatalog;
    use crate::transpiler::ToSql;
    use pretty_assertions::assert_eq;

    fn employees() -> TableSchema {
        TableSchema::new("employees")
            .column("id", ColumnType::Integer)
            .column("salary", ColumnType::Numeric)
            .column("is_active", ColumnType::Boolean)
            .column("department", ColumnType::Text)
            .column("profile", ColumnType::Jsonb)
    }

    #[test]
    fn test_empty_over() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let expr = agg.count().over().into_node();
        assert_eq!(expr.to_sql(), "CAST(COUNT(*) OVER () AS integer)");
    }

    #[test]
    fn test_rows_preceding_running_pair() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let spec = FrameSpec::from_tuples(("preceding", Some(1)), ("current row", None)).unwrap();
        let expr = agg
            .sum("salary")
            .unwrap()
            .over()
            .order_by(["salary"])
            .unwrap()
            .rows(spec)
            .alias("pair_sum");
        assert_eq!(
            expr.to_sql(),
            "CAST(SUM(salary) OVER (ORDER BY salary ASC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW) AS float8) AS pair_sum"
        );
    }

    #[test]
    fn test_partition_count() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let expr = agg.count().over().partition_by(["is_active"]).unwrap().into_node();
        assert_eq!(
            expr.to_sql(),
            "CAST(COUNT(*) OVER (PARTITION BY is_active) AS integer)"
        );
    }

    #[test]
    fn test_full_chain_with_exclude() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let expr = agg
            .sum("salary")
            .unwrap()
            .over()
            .partition_by(["is_active"])
            .unwrap()
            .order_by(["salary"])
            .unwrap()
            .rows(FrameSpec::whole())
            .exclude(ExcludeOption::CurrentRow)
            .into_node();
        assert_eq!(
            expr.to_sql(),
            "CAST(SUM(salary) OVER (PARTITION BY is_active ORDER BY salary ASC \
             ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING EXCLUDE CURRENT ROW) AS float8)"
        );
    }

    #[test]
    fn test_range_and_groups_after_order() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let spec = FrameSpec::new(Boundary::Preceding(2), Boundary::Following(1)).unwrap();
        let groups = agg
            .avg("salary")
            .unwrap()
            .over()
            .order_by([("salary", SortOrder::Desc)])
            .unwrap()
            .groups(spec)
            .exclude(ExcludeOption::Ties)
            .into_node();
        assert_eq!(
            groups.to_sql(),
            "CAST(AVG(salary) OVER (ORDER BY salary DESC GROUPS BETWEEN 2 PRECEDING AND 1 FOLLOWING EXCLUDE TIES) AS float8)"
        );

        let range = agg
            .max("salary")
            .unwrap()
            .over()
            .order_by(["id"])
            .unwrap()
            .range(spec)
            .into_node();
        assert_eq!(
            range.to_sql(),
            "MAX(salary) OVER (ORDER BY id ASC RANGE BETWEEN 2 PRECEDING AND 1 FOLLOWING)"
        );
    }

    #[test]
    fn test_json_partition_and_ranking() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let expr = agg
            .rank()
            .over()
            .partition_by([ColumnArg::json("profile", |p| p.key("team"))])
            .unwrap()
            .order_by([("salary", SortOrder::Desc)])
            .unwrap()
            .alias("team_rank");
        assert_eq!(
            expr.to_sql(),
            "CAST(RANK() OVER (PARTITION BY profile->'team' ORDER BY salary DESC) AS integer) AS team_rank"
        );
    }

    #[test]
    fn test_clause_errors() {
        let table = employees();
        let agg = AggregateCatalog::for_table(&table);
        let empty: [&str; 0] = [];
        assert!(matches!(
            agg.count().over().partition_by(empty),
            Err(CritError::EmptyClause("partition_by"))
        ));
        assert!(matches!(
            agg.count().over().order_by(["missing"]),
            Err(CritError::UnknownColumn { .. })
        ));
        assert!(matches!(
            agg.count().over().partition_by(["profile"]),
            Err(CritError::JsonPathRequired { function: "partition_by", .. })
        ));
    }
}

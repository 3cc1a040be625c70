//! Aggregate function catalog (SUM, AVG, CORR, PERCENTILE_CONT, ...).
//!
//! Every entry resolves its column against the table schema. JSON-typed
//! columns must be navigated with a path; the other types must not be.
//! Numeric results are cast to `float8` or `integer` so callers always get
//! the same wire type whatever the column's storage precision.

use crate::ast::{ColumnArg, ColumnType, Expr, TableSchema, col, lit};
use crate::error::{CritError, CritResult};

use super::window::{Fresh, WindowBuilder};

/// Stable numeric result type applied around an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericCast {
    Float8,
    Float8Array,
    Integer,
}

impl NumericCast {
    pub fn sql_name(&self) -> &'static str {
        match self {
            NumericCast::Float8 => "float8",
            NumericCast::Float8Array => "float8[]",
            NumericCast::Integer => "integer",
        }
    }
}

pub(crate) fn apply_cast(expr: Expr, cast: Option<NumericCast>) -> Expr {
    match cast {
        Some(cast) => expr.cast(cast.sql_name()),
        None => expr,
    }
}

/// How a JSON path is extracted before it reaches the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extract {
    /// `->`, keeps JSON
    Json,
    /// `->>`, text
    Text,
    /// `->>` cast to a SQL type
    Typed(&'static str),
}

/// A column resolved against the schema. `ty` is `None` for JSON paths.
pub(crate) struct Resolved {
    pub expr: Expr,
    pub ty: Option<ColumnType>,
}

/// Resolve a column argument.
///
/// With `path_required`, a bare JSON column is rejected.
pub(crate) fn resolve(
    table: &TableSchema,
    function: &'static str,
    arg: &ColumnArg,
    extract: Extract,
    path_required: bool,
) -> CritResult<Resolved> {
    match arg {
        ColumnArg::Plain(name) => {
            let def = table.require(name)?;
            if path_required && def.ty.is_json() {
                return Err(CritError::JsonPathRequired {
                    function,
                    column: name.clone(),
                });
            }
            Ok(Resolved {
                expr: col(name),
                ty: Some(def.ty),
            })
        }
        ColumnArg::Json { column, path } => {
            let def = table.require(column)?;
            if !def.ty.is_json() {
                return Err(CritError::UnexpectedJsonPath {
                    function,
                    column: column.clone(),
                });
            }
            let access = Expr::JsonAccess {
                base: Box::new(col(column)),
                path: path.clone(),
                as_text: extract != Extract::Json,
            };
            let expr = match extract {
                Extract::Typed(target) => access.cast(target),
                Extract::Json | Extract::Text => access,
            };
            Ok(Resolved { expr, ty: None })
        }
    }
}

fn aggregate(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Aggregate {
        name: name.to_string(),
        args,
        distinct: false,
        within_group: None,
    }
}

/// One or several percentile fractions.
#[derive(Debug, Clone, PartialEq)]
pub enum Fractions {
    One(f64),
    Many(Vec<f64>),
}

impl Fractions {
    fn validate(&self, function: &'static str) -> CritResult<()> {
        let values: &[f64] = match self {
            Fractions::One(f) => std::slice::from_ref(f),
            Fractions::Many(fs) => fs,
        };
        if values.is_empty() {
            return Err(CritError::InvalidFraction {
                function,
                message: "list is empty".to_string(),
            });
        }
        if let Some(bad) = values.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(CritError::InvalidFraction {
                function,
                message: format!("{} is outside [0, 1]", bad),
            });
        }
        Ok(())
    }

    fn to_expr(&self) -> Expr {
        match self {
            Fractions::One(f) => lit(*f),
            Fractions::Many(fs) => Expr::Array(fs.iter().map(|f| lit(*f)).collect()),
        }
    }
}

impl From<f64> for Fractions {
    fn from(f: f64) -> Self {
        Fractions::One(f)
    }
}

impl From<Vec<f64>> for Fractions {
    fn from(fs: Vec<f64>) -> Self {
        Fractions::Many(fs)
    }
}

impl<const N: usize> From<[f64; N]> for Fractions {
    fn from(fs: [f64; N]) -> Self {
        Fractions::Many(fs.to_vec())
    }
}

/// An aggregate waiting for an alias, a window, or to be used as a node.
#[derive(Debug, Clone)]
pub struct AggregateChain<'a> {
    table: &'a TableSchema,
    expr: Expr,
    cast: Option<NumericCast>,
}

impl<'a> AggregateChain<'a> {
    fn new(table: &'a TableSchema, expr: Expr, cast: Option<NumericCast>) -> Self {
        Self { table, expr, cast }
    }

    pub fn cast(&self) -> Option<NumericCast> {
        self.cast
    }

    /// Finish as `aggregate AS alias`.
    pub fn alias(self, name: &str) -> Expr {
        self.into_node().with_alias(name)
    }

    /// Turn the aggregate into a window function.
    pub fn over(self) -> WindowBuilder<'a, Fresh> {
        WindowBuilder::new(self.table, self.expr, self.cast)
    }

    pub fn into_node(self) -> Expr {
        apply_cast(self.expr, self.cast)
    }
}

/// Ordered-set aggregate (`WITHIN GROUP`). Postgres cannot run these as window functions.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedSetChain {
    expr: Expr,
    cast: Option<NumericCast>,
}

impl OrderedSetChain {
    pub fn alias(self, name: &str) -> Expr {
        self.into_node().with_alias(name)
    }

    pub fn into_node(self) -> Expr {
        apply_cast(self.expr, self.cast)
    }
}

/// Ranking function that only exists with an `OVER` clause.
#[derive(Debug, Clone)]
pub struct RankingChain<'a> {
    table: &'a TableSchema,
    expr: Expr,
}

impl<'a> RankingChain<'a> {
    pub fn over(self) -> WindowBuilder<'a, Fresh> {
        WindowBuilder::new(self.table, self.expr, Some(NumericCast::Integer))
    }
}

/// Aggregate catalog bound to one table.
#[derive(Debug, Clone, Copy)]
pub struct AggregateCatalog<'a> {
    table: &'a TableSchema,
}

impl<'a> AggregateCatalog<'a> {
    pub fn for_table(table: &'a TableSchema) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'a TableSchema {
        self.table
    }

    fn chain(&self, expr: Expr, cast: Option<NumericCast>) -> AggregateChain<'a> {
        AggregateChain::new(self.table, expr, cast)
    }

    /// Resolve a column that must hold numbers (or an interval where `allow_interval`).
    fn numeric_arg(
        &self,
        function: &'static str,
        arg: ColumnArg,
        allow_interval: bool,
    ) -> CritResult<Expr> {
        let resolved = resolve(self.table, function, &arg, Extract::Typed("numeric"), true)?;
        match resolved.ty {
            Some(ty) if !(ty.is_numeric() || (allow_interval && ty == ColumnType::Interval)) => {
                Err(CritError::UnsupportedColumnType {
                    function,
                    column: arg.column().to_string(),
                    column_type: ty.to_string(),
                })
            }
            _ => Ok(resolved.expr),
        }
    }

    fn numeric(
        &self,
        function: &'static str,
        name: &str,
        arg: ColumnArg,
        cast: NumericCast,
    ) -> CritResult<AggregateChain<'a>> {
        let expr = self.numeric_arg(function, arg, false)?;
        Ok(self.chain(aggregate(name, vec![expr]), Some(cast)))
    }

    fn two_column(
        &self,
        function: &'static str,
        name: &str,
        y: ColumnArg,
        x: ColumnArg,
        cast: NumericCast,
    ) -> CritResult<AggregateChain<'a>> {
        let y = self.numeric_arg(function, y, false)?;
        let x = self.numeric_arg(function, x, false)?;
        Ok(self.chain(aggregate(name, vec![y, x]), Some(cast)))
    }

    // ==================== Counting ====================

    /// COUNT(*)
    pub fn count(&self) -> AggregateChain<'a> {
        self.chain(aggregate("COUNT", vec![Expr::Star]), Some(NumericCast::Integer))
    }

    /// COUNT(column), ignoring NULLs
    pub fn count_column(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let arg = resolve(self.table, "count", &column.into(), Extract::Json, true)?;
        Ok(self.chain(aggregate("COUNT", vec![arg.expr]), Some(NumericCast::Integer)))
    }

    /// COUNT(DISTINCT column)
    pub fn count_distinct(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let arg = resolve(self.table, "count_distinct", &column.into(), Extract::Json, true)?;
        let expr = Expr::Aggregate {
            name: "COUNT".to_string(),
            args: vec![arg.expr],
            distinct: true,
            within_group: None,
        };
        Ok(self.chain(expr, Some(NumericCast::Integer)))
    }

    // ==================== Basic numeric ====================

    pub fn sum(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let arg = column.into();
        let interval = self.is_interval(&arg);
        let expr = self.numeric_arg("sum", arg, true)?;
        let cast = if interval { None } else { Some(NumericCast::Float8) };
        Ok(self.chain(aggregate("SUM", vec![expr]), cast))
    }

    pub fn avg(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let arg = column.into();
        let interval = self.is_interval(&arg);
        let expr = self.numeric_arg("avg", arg, true)?;
        let cast = if interval { None } else { Some(NumericCast::Float8) };
        Ok(self.chain(aggregate("AVG", vec![expr]), cast))
    }

    fn is_interval(&self, arg: &ColumnArg) -> bool {
        matches!(arg, ColumnArg::Plain(name)
            if self.table.find(name).is_some_and(|c| c.ty == ColumnType::Interval))
    }

    /// MIN(column), native type
    pub fn min(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let arg = resolve(self.table, "min", &column.into(), Extract::Typed("numeric"), true)?;
        Ok(self.chain(aggregate("MIN", vec![arg.expr]), None))
    }

    /// MAX(column), native type
    pub fn max(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let arg = resolve(self.table, "max", &column.into(), Extract::Typed("numeric"), true)?;
        Ok(self.chain(aggregate("MAX", vec![arg.expr]), None))
    }

    // ==================== Statistics ====================

    pub fn stddev_pop(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.numeric("stddev_pop", "STDDEV_POP", column.into(), NumericCast::Float8)
    }

    pub fn stddev_samp(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.numeric("stddev_samp", "STDDEV_SAMP", column.into(), NumericCast::Float8)
    }

    pub fn var_pop(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.numeric("var_pop", "VAR_POP", column.into(), NumericCast::Float8)
    }

    pub fn var_samp(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.numeric("var_samp", "VAR_SAMP", column.into(), NumericCast::Float8)
    }

    // ==================== Correlation / regression ====================

    /// CORR(y, x)
    pub fn corr(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("corr", "CORR", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn covar_pop(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("covar_pop", "COVAR_POP", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn covar_samp(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("covar_samp", "COVAR_SAMP", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_slope(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_slope", "REGR_SLOPE", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_intercept(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_intercept", "REGR_INTERCEPT", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_r2(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_r2", "REGR_R2", y.into(), x.into(), NumericCast::Float8)
    }

    /// REGR_COUNT(y, x): rows where both are non-null
    pub fn regr_count(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_count", "REGR_COUNT", y.into(), x.into(), NumericCast::Integer)
    }

    pub fn regr_avgx(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_avgx", "REGR_AVGX", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_avgy(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_avgy", "REGR_AVGY", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_sxx(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_sxx", "REGR_SXX", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_syy(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_syy", "REGR_SYY", y.into(), x.into(), NumericCast::Float8)
    }

    pub fn regr_sxy(&self, y: impl Into<ColumnArg>, x: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.two_column("regr_sxy", "REGR_SXY", y.into(), x.into(), NumericCast::Float8)
    }

    // ==================== Boolean ====================

    pub fn bool_and(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.boolean("bool_and", "BOOL_AND", column.into())
    }

    pub fn bool_or(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        self.boolean("bool_or", "BOOL_OR", column.into())
    }

    fn boolean(&self, function: &'static str, name: &str, arg: ColumnArg) -> CritResult<AggregateChain<'a>> {
        let resolved = resolve(self.table, function, &arg, Extract::Typed("boolean"), true)?;
        if let Some(ty) = resolved.ty.filter(|ty| *ty != ColumnType::Boolean) {
            return Err(CritError::UnsupportedColumnType {
                function,
                column: arg.column().to_string(),
                column_type: ty.to_string(),
            });
        }
        Ok(self.chain(aggregate(name, vec![resolved.expr]), None))
    }

    // ==================== String / array / JSON ====================

    /// STRING_AGG(column, delimiter); non-text columns are cast to text.
    pub fn string_agg(&self, column: impl Into<ColumnArg>, delimiter: &str) -> CritResult<AggregateChain<'a>> {
        let resolved = resolve(self.table, "string_agg", &column.into(), Extract::Text, true)?;
        let expr = match resolved.ty {
            Some(ty) if ty != ColumnType::Text => resolved.expr.cast("text"),
            _ => resolved.expr,
        };
        Ok(self.chain(aggregate("STRING_AGG", vec![expr, lit(delimiter)]), None))
    }

    pub fn array_agg(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let resolved = resolve(self.table, "array_agg", &column.into(), Extract::Json, true)?;
        Ok(self.chain(aggregate("ARRAY_AGG", vec![resolved.expr]), None))
    }

    pub fn json_agg(&self, column: impl Into<ColumnArg>) -> CritResult<AggregateChain<'a>> {
        let resolved = resolve(self.table, "json_agg", &column.into(), Extract::Json, true)?;
        Ok(self.chain(aggregate("JSON_AGG", vec![resolved.expr]), None))
    }

    /// JSON_OBJECT_AGG(key, value)
    pub fn json_object_agg(
        &self,
        key: impl Into<ColumnArg>,
        value: impl Into<ColumnArg>,
    ) -> CritResult<AggregateChain<'a>> {
        let key = resolve(self.table, "json_object_agg", &key.into(), Extract::Text, true)?;
        let value = resolve(self.table, "json_object_agg", &value.into(), Extract::Json, true)?;
        Ok(self.chain(aggregate("JSON_OBJECT_AGG", vec![key.expr, value.expr]), None))
    }

    // ==================== Ordered-set ====================

    /// MODE() WITHIN GROUP (ORDER BY column), native type
    pub fn mode(&self, column: impl Into<ColumnArg>) -> CritResult<OrderedSetChain> {
        let resolved = resolve(self.table, "mode", &column.into(), Extract::Json, true)?;
        Ok(OrderedSetChain {
            expr: ordered_set("MODE", vec![], resolved.expr),
            cast: None,
        })
    }

    /// Continuous percentile, interpolated between neighbouring values.
    ///
    /// Numeric columns yield `float8` (`float8[]` for several fractions).
    /// Dates and timestamps are interpolated on their epoch and come back as
    /// `timestamptz`; those only accept a single fraction.
    pub fn percentile_cont(
        &self,
        fractions: impl Into<Fractions>,
        column: impl Into<ColumnArg>,
    ) -> CritResult<OrderedSetChain> {
        const FUNCTION: &str = "percentile_cont";
        let fractions = fractions.into();
        fractions.validate(FUNCTION)?;
        let arg = column.into();
        let resolved = resolve(self.table, FUNCTION, &arg, Extract::Typed("numeric"), true)?;
        let array_cast = match fractions {
            Fractions::One(_) => NumericCast::Float8,
            Fractions::Many(_) => NumericCast::Float8Array,
        };

        let unsupported = |ty: ColumnType| CritError::UnsupportedColumnType {
            function: FUNCTION,
            column: arg.column().to_string(),
            column_type: ty.to_string(),
        };

        match resolved.ty {
            None => Ok(OrderedSetChain {
                expr: ordered_set("PERCENTILE_CONT", vec![fractions.to_expr()], resolved.expr),
                cast: Some(array_cast),
            }),
            Some(ty) if ty.is_numeric() => Ok(OrderedSetChain {
                expr: ordered_set("PERCENTILE_CONT", vec![fractions.to_expr()], resolved.expr),
                cast: Some(array_cast),
            }),
            Some(ColumnType::Interval) => Ok(OrderedSetChain {
                expr: ordered_set("PERCENTILE_CONT", vec![fractions.to_expr()], resolved.expr),
                cast: None,
            }),
            Some(ty @ (ColumnType::Date | ColumnType::Timestamp | ColumnType::Timestamptz)) => {
                if matches!(fractions, Fractions::Many(_)) {
                    return Err(unsupported(ty));
                }
                let epoch = Expr::Special {
                    name: "EXTRACT".to_string(),
                    args: vec![
                        (None, Expr::Raw("EPOCH".to_string())),
                        (Some("FROM".to_string()), resolved.expr),
                    ],
                };
                let percentile = ordered_set("PERCENTILE_CONT", vec![fractions.to_expr()], epoch);
                Ok(OrderedSetChain {
                    expr: Expr::func("TO_TIMESTAMP", vec![percentile]),
                    cast: None,
                })
            }
            Some(ty) => Err(unsupported(ty)),
        }
    }

    /// Discrete percentile: the first value whose cumulative share reaches the fraction.
    /// Works on any orderable column and keeps its type.
    pub fn percentile_disc(
        &self,
        fractions: impl Into<Fractions>,
        column: impl Into<ColumnArg>,
    ) -> CritResult<OrderedSetChain> {
        let fractions = fractions.into();
        fractions.validate("percentile_disc")?;
        let resolved = resolve(self.table, "percentile_disc", &column.into(), Extract::Json, true)?;
        Ok(OrderedSetChain {
            expr: ordered_set("PERCENTILE_DISC", vec![fractions.to_expr()], resolved.expr),
            cast: None,
        })
    }

    // ==================== Ranking ====================

    pub fn row_number(&self) -> RankingChain<'a> {
        self.ranking("ROW_NUMBER")
    }

    pub fn rank(&self) -> RankingChain<'a> {
        self.ranking("RANK")
    }

    pub fn dense_rank(&self) -> RankingChain<'a> {
        self.ranking("DENSE_RANK")
    }

    fn ranking(&self, name: &str) -> RankingChain<'a> {
        RankingChain {
            table: self.table,
            expr: aggregate(name, vec![]),
        }
    }
}

fn ordered_set(name: &str, direct: Vec<Expr>, order: Expr) -> Expr {
    Expr::Aggregate {
        name: name.to_string(),
        args: direct,
        distinct: false,
        within_group: Some(Box::new(order)),
    }
}

impl From<OrderedSetChain> for Expr {
    fn from(chain: OrderedSetChain) -> Self {
        chain.into_node()
    }
}

impl From<AggregateChain<'_>> for Expr {
    fn from(chain: AggregateChain<'_>) -> Self {
        chain.into_node()
    }
}

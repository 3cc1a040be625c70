//! Table accessor: compiles criteria and projections, then executes them
//! against PostgreSQL through sqlx.
//!
//! Every call compiles into its own [`ParamContext`], so a [`Table`] can be
//! cloned and shared between tasks freely.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Column, Postgres, Row, TypeInfo};
use tracing::{debug, info};

use crate::ast::{ColumnDef, ColumnType, Expr, TableSchema, Value};
use crate::builders::AggregateCatalog;
use crate::config::Config;
use crate::error::{CritError, CritResult};
use crate::transpiler::{ParamContext, ToSql, quote_ident, quote_qualified};
use crate::where_clause::CriteriaMap;

/// A decoded row, keyed by column name.
pub type RowMap = HashMap<String, serde_json::Value>;

type AggregateFn = Box<dyn for<'a> Fn(&AggregateCatalog<'a>) -> CritResult<Expr> + Send + Sync>;

/// One entry of a SELECT list.
pub enum Selection {
    /// Plain column
    Column(String),
    /// Any prebuilt expression (scalar function chains, aliased or not)
    Expr(Expr),
    /// Aggregate or window projection, built against the table's catalog
    Aggregate { alias: String, builder: AggregateFn },
}

impl Selection {
    pub fn column(name: &str) -> Self {
        Selection::Column(name.to_string())
    }

    /// `builder(catalog) AS alias`. An alias set inside the builder is replaced.
    pub fn aggregate<F>(alias: &str, builder: F) -> Self
    where
        F: for<'a> Fn(&AggregateCatalog<'a>) -> CritResult<Expr> + Send + Sync + 'static,
    {
        Selection::Aggregate {
            alias: alias.to_string(),
            builder: Box::new(builder),
        }
    }

    fn compile(&self, table: &TableSchema) -> CritResult<Expr> {
        match self {
            Selection::Column(name) => Ok(Expr::Column(name.clone())),
            Selection::Expr(expr) => Ok(expr.clone()),
            Selection::Aggregate { alias, builder } => {
                let catalog = AggregateCatalog::for_table(table);
                let expr = match builder(&catalog)? {
                    Expr::Aliased { expr, .. } => *expr,
                    expr => expr,
                };
                Ok(expr.with_alias(alias))
            }
        }
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Column(name) => f.debug_tuple("Column").field(name).finish(),
            Selection::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            Selection::Aggregate { alias, .. } => f
                .debug_struct("Aggregate")
                .field("alias", alias)
                .finish_non_exhaustive(),
        }
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Selection::column(name)
    }
}

impl From<Expr> for Selection {
    fn from(expr: Expr) -> Self {
        Selection::Expr(expr)
    }
}

/// A compiled statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    fn to_sqlx(&self) -> CritResult<SqlxQuery<'_, Postgres, PgArguments>> {
        let mut query = sqlx::query(&self.sql);
        for param in &self.params {
            query = bind_value(query, param)?;
        }
        Ok(query)
    }
}

fn bind_value<'q>(
    query: SqlxQuery<'q, Postgres, PgArguments>,
    value: &Value,
) -> CritResult<SqlxQuery<'q, Postgres, PgArguments>> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Json(v) => query.bind(sqlx::types::Json(v.clone())),
        Value::Date(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::Uuid(v) => query.bind(*v),
        Value::Array(_) => {
            return Err(CritError::Execution(
                "array parameters must be expanded before binding".to_string(),
            ));
        }
    })
}

/// Access to one table: `select_where`, `update_where`, `delete_where`.
#[derive(Debug, Clone)]
pub struct Table {
    pool: PgPool,
    schema: Arc<TableSchema>,
    statement_log: bool,
}

impl Table {
    pub fn new(pool: PgPool, schema: TableSchema) -> Self {
        Self {
            pool,
            schema: Arc::new(schema),
            statement_log: false,
        }
    }

    /// Connect a pool from the configuration.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load()?;
    /// let employees = Table::connect(&config, config.table("employees")?.clone()).await?;
    /// ```
    pub async fn connect(config: &Config, schema: TableSchema) -> CritResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(config.database_url()?)
            .await
            .map_err(|e| CritError::Connection(e.to_string()))?;
        info!(table = %schema.name, max_connections = config.max_connections, "connected");

        let mut table = Self::new(pool, schema);
        table.statement_log = config.statement_log;
        Ok(table)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ==================== Compilation ====================

    /// `SELECT columns FROM table WHERE criteria`; no columns selects `*`.
    pub fn build_select(&self, columns: &[Selection], criteria: &CriteriaMap) -> CritResult<Query> {
        build_select(&self.schema, columns, criteria)
    }

    /// `UPDATE table SET ... WHERE criteria`
    pub fn build_update(&self, set: &[(&str, Value)], criteria: &CriteriaMap) -> CritResult<Query> {
        build_update(&self.schema, set, criteria)
    }

    /// `DELETE FROM table WHERE criteria RETURNING *`
    pub fn build_delete(&self, criteria: &CriteriaMap) -> CritResult<Query> {
        build_delete(&self.schema, criteria)
    }

    // ==================== Execution ====================

    pub async fn select_where(
        &self,
        columns: &[Selection],
        criteria: &CriteriaMap,
    ) -> CritResult<Vec<RowMap>> {
        let query = self.build_select(columns, criteria)?;
        self.log_statement(&query);
        let rows = query
            .to_sqlx()?
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CritError::Execution(e.to_string()))?;
        info!(table = %self.schema.name, rows = rows.len(), "select_where");
        rows.iter().map(row_to_map).collect()
    }

    /// Returns the number of updated rows.
    pub async fn update_where(
        &self,
        set: &[(&str, Value)],
        criteria: &CriteriaMap,
    ) -> CritResult<u64> {
        let query = self.build_update(set, criteria)?;
        self.log_statement(&query);
        let result = query
            .to_sqlx()?
            .execute(&self.pool)
            .await
            .map_err(|e| CritError::Execution(e.to_string()))?;
        info!(table = %self.schema.name, rows = result.rows_affected(), "update_where");
        Ok(result.rows_affected())
    }

    /// Returns the deleted rows.
    pub async fn delete_where(&self, criteria: &CriteriaMap) -> CritResult<Vec<RowMap>> {
        let query = self.build_delete(criteria)?;
        self.log_statement(&query);
        let rows = query
            .to_sqlx()?
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CritError::Execution(e.to_string()))?;
        info!(table = %self.schema.name, rows = rows.len(), "delete_where");
        rows.iter().map(row_to_map).collect()
    }

    fn log_statement(&self, query: &Query) {
        if self.statement_log {
            info!(sql = %query.sql, params = query.params.len(), "executing");
        } else {
            debug!(sql = %query.sql, params = query.params.len(), "executing");
        }
    }
}

fn where_sql(table: &TableSchema, criteria: &CriteriaMap, ctx: &mut ParamContext) -> CritResult<String> {
    if criteria.is_empty() {
        return Ok(String::new());
    }
    let predicate = type_literals(criteria.compile(), table)?;
    Ok(format!(" WHERE {}", predicate.to_sql_params(ctx)))
}

// ==================== Parameter typing ====================

/// Give text literals compared against a known column that column's type.
///
/// Strings are bound as `text`, which Postgres will not compare with `date`,
/// `uuid` or `interval` columns. Dates, timestamps and uuids are parsed here so
/// malformed input fails before the round trip; other non-text columns get a
/// `CAST` and are parsed by the server.
fn type_literals(expr: Expr, table: &TableSchema) -> CritResult<Expr> {
    Ok(match expr {
        Expr::Compare { left, op, right } => {
            let right = match (column_def(&left, table), *right) {
                (Some(def), Expr::Literal(value)) => typed_literal(value, def)?,
                (_, right) => right,
            };
            Expr::Compare {
                left,
                op,
                right: Box::new(right),
            }
        }
        Expr::Between {
            expr,
            low,
            high,
            symmetric,
        } => {
            let (low, high) = match (column_def(&expr, table), *low, *high) {
                (Some(def), Expr::Literal(low), Expr::Literal(high)) => {
                    (typed_literal(low, def)?, typed_literal(high, def)?)
                }
                (_, low, high) => (low, high),
            };
            Expr::Between {
                expr,
                low: Box::new(low),
                high: Box::new(high),
                symmetric,
            }
        }
        Expr::Logical { op, operands } => Expr::Logical {
            op,
            operands: operands
                .into_iter()
                .map(|operand| type_literals(operand, table))
                .collect::<CritResult<_>>()?,
        },
        other => other,
    })
}

fn column_def<'t>(expr: &Expr, table: &'t TableSchema) -> Option<&'t ColumnDef> {
    match expr {
        Expr::Column(name) => table.find(name.rsplit('.').next().unwrap_or(name.as_str())),
        _ => None,
    }
}

fn typed_literal(value: Value, def: &ColumnDef) -> CritResult<Expr> {
    match value {
        Value::Array(items) if !items.is_empty() => {
            let items = items
                .into_iter()
                .map(|item| typed_literal(item, def))
                .collect::<CritResult<Vec<_>>>()?;
            Ok(Expr::Array(items))
        }
        Value::Text(text) => typed_text(text, def),
        other => Ok(Expr::Literal(other)),
    }
}

fn typed_text(text: String, def: &ColumnDef) -> CritResult<Expr> {
    let parsed = match def.ty {
        ColumnType::Text | ColumnType::Json | ColumnType::Jsonb => {
            return Ok(Expr::Literal(Value::Text(text)));
        }
        ColumnType::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| e.to_string()),
        ColumnType::Timestamp => parse_timestamp(&text)
            .map(Value::Timestamp)
            .map_err(|e| e.to_string()),
        ColumnType::Uuid => uuid::Uuid::parse_str(text.trim())
            .map(Value::Uuid)
            .map_err(|e| e.to_string()),
        ty => return Ok(Expr::Literal(Value::Text(text)).cast(ty.sql_name())),
    };
    parsed.map(Expr::Literal).map_err(|message| {
        CritError::criterion(
            &def.name,
            format!("'{}' is not a valid {}: {}", text, def.ty, message),
        )
    })
}

/// `2021-01-01T08:30:00`, `2021-01-01 08:30:00.5` or a bare date at midnight.
fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|e| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
                .map_err(|_| e)
        })
}

fn build_select(table: &TableSchema, columns: &[Selection], criteria: &CriteriaMap) -> CritResult<Query> {
    let mut ctx = ParamContext::new();
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        let mut parts = Vec::with_capacity(columns.len());
        for selection in columns {
            parts.push(selection.compile(table)?.to_sql_params(&mut ctx));
        }
        parts.join(", ")
    };
    let sql = format!(
        "SELECT {} FROM {}{}",
        projection,
        quote_qualified(&table.name),
        where_sql(table, criteria, &mut ctx)?
    );
    debug!(table = %table.name, %sql, "compiled select");
    Ok(Query {
        sql,
        params: ctx.params,
    })
}

fn build_update(table: &TableSchema, set: &[(&str, Value)], criteria: &CriteriaMap) -> CritResult<Query> {
    if set.is_empty() {
        return Err(CritError::EmptyClause("update_where"));
    }
    let mut ctx = ParamContext::new();
    let assignments: Vec<String> = set
        .iter()
        .map(|(column, value)| {
            let rhs = match table.find(column) {
                Some(def) => typed_literal(value.clone(), def)?,
                None => Expr::Literal(value.clone()),
            };
            Ok(format!("{} = {}", quote_ident(column), rhs.to_sql_params(&mut ctx)))
        })
        .collect::<CritResult<_>>()?;
    let sql = format!(
        "UPDATE {} SET {}{}",
        quote_qualified(&table.name),
        assignments.join(", "),
        where_sql(table, criteria, &mut ctx)?
    );
    debug!(table = %table.name, %sql, "compiled update");
    Ok(Query {
        sql,
        params: ctx.params,
    })
}

fn build_delete(table: &TableSchema, criteria: &CriteriaMap) -> CritResult<Query> {
    let mut ctx = ParamContext::new();
    let sql = format!(
        "DELETE FROM {}{} RETURNING *",
        quote_qualified(&table.name),
        where_sql(table, criteria, &mut ctx)?
    );
    debug!(table = %table.name, %sql, "compiled delete");
    Ok(Query {
        sql,
        params: ctx.params,
    })
}

/// Convert a PgRow to a map, decoding by Postgres type name.
fn row_to_map(row: &PgRow) -> CritResult<RowMap> {
    use serde_json::Value as Json;

    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value: Json = match type_name {
            "BOOL" => decode(row, i, Json::Bool)?,
            "INT2" => decode(row, i, |v: i16| Json::from(v))?,
            "INT4" => decode(row, i, |v: i32| Json::from(v))?,
            "INT8" => decode(row, i, |v: i64| Json::from(v))?,
            "FLOAT4" => decode(row, i, |v: f32| float_to_json(f64::from(v)))?,
            "FLOAT8" => decode(row, i, float_to_json)?,
            "NUMERIC" => decode(row, i, decimal_to_json)?,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => decode(row, i, Json::String)?,
            "JSON" | "JSONB" => decode(row, i, |v: Json| v)?,
            "DATE" => decode(row, i, |v: chrono::NaiveDate| Json::String(v.to_string()))?,
            "TIMESTAMP" => decode(row, i, |v: chrono::NaiveDateTime| {
                Json::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            })?,
            "TIMESTAMPTZ" => decode(row, i, |v: chrono::DateTime<chrono::Utc>| {
                Json::String(v.to_rfc3339())
            })?,
            "UUID" => decode(row, i, |v: uuid::Uuid| Json::String(v.to_string()))?,
            "INTERVAL" => decode(row, i, |v: PgInterval| Json::String(format_interval(&v)))?,
            "FLOAT8[]" => decode(row, i, |v: Vec<f64>| {
                Json::Array(v.into_iter().map(float_to_json).collect())
            })?,
            "NUMERIC[]" => decode(row, i, |v: Vec<Decimal>| {
                Json::Array(v.into_iter().map(decimal_to_json).collect())
            })?,
            "INT4[]" => decode(row, i, |v: Vec<i32>| Json::from(v))?,
            "INT8[]" => decode(row, i, |v: Vec<i64>| Json::from(v))?,
            "TEXT[]" => decode(row, i, |v: Vec<String>| Json::from(v))?,
            "BOOL[]" => decode(row, i, |v: Vec<bool>| Json::from(v))?,
            "INT2[]" => decode(row, i, |v: Vec<i16>| Json::from(v))?,
            "FLOAT4[]" => decode(row, i, |v: Vec<f32>| {
                Json::Array(v.into_iter().map(|f| float_to_json(f64::from(f))).collect())
            })?,
            "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => decode(row, i, |v: Vec<String>| Json::from(v))?,
            "JSON[]" | "JSONB[]" => decode(row, i, |v: Vec<Json>| Json::Array(v))?,
            "DATE[]" => decode(row, i, |v: Vec<NaiveDate>| {
                Json::Array(v.into_iter().map(|d| Json::String(d.to_string())).collect())
            })?,
            "TIMESTAMP[]" => decode(row, i, |v: Vec<NaiveDateTime>| {
                Json::Array(
                    v.into_iter()
                        .map(|t| Json::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                        .collect(),
                )
            })?,
            "TIMESTAMPTZ[]" => decode(row, i, |v: Vec<chrono::DateTime<chrono::Utc>>| {
                Json::Array(v.into_iter().map(|t| Json::String(t.to_rfc3339())).collect())
            })?,
            "UUID[]" => decode(row, i, |v: Vec<uuid::Uuid>| {
                Json::Array(v.into_iter().map(|u| Json::String(u.to_string())).collect())
            })?,
            "INTERVAL[]" => decode(row, i, |v: Vec<PgInterval>| {
                Json::Array(v.iter().map(|d| Json::String(format_interval(d))).collect())
            })?,
            other => {
                debug!(column = %name, type_name = other, "no decoder, trying text");
                row.try_get::<Option<String>, _>(i)
                    .map(|v| v.map(Json::String).unwrap_or(Json::Null))
                    .map_err(|e| {
                        CritError::Database(format!(
                            "cannot decode column '{}' of type {}: {}",
                            name, other, e
                        ))
                    })?
            }
        };

        map.insert(name, value);
    }

    Ok(map)
}

fn decode<'r, T, F>(row: &'r PgRow, index: usize, convert: F) -> CritResult<serde_json::Value>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> serde_json::Value,
{
    row.try_get::<Option<T>, _>(index)
        .map(|v| v.map(convert).unwrap_or(serde_json::Value::Null))
        .map_err(|e| CritError::Database(e.to_string()))
}

/// Postgres' own interval output: `1 year 2 mons 3 days 04:05:06.5`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i32, name: &str) -> String {
        format!("{} {}{}", n, name, if n == 1 { "" } else { "s" })
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let seconds = micros / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            let digits = format!("{:06}", fraction);
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

fn float_to_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Whole decimals become integers; the rest go through f64.
fn decimal_to_json(d: Decimal) -> serde_json::Value {
    if d.fract().is_zero() {
        if let Some(n) = d.to_i64() {
            return serde_json::Value::from(n);
        }
    }
    d.to_f64()
        .map(float_to_json)
        .unwrap_or_else(|| serde_json::Value::String(d.to_string()))
}

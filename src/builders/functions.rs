//! Chainable scalar-function builder.
//!
//! [`ScalarFn`] wraps an expression; each method consumes the handle and
//! returns a new one around the new call, so calls compose:
//!
//! ```ignore
//! ScalarFn::column("name").lower().left(1)   // LEFT(LOWER(name), 1)
//! ```

use std::str::FromStr;

use crate::ast::{BinaryOp, Expr, JsonPath, Value, col, lit};
use crate::error::CritError;

/// Units for date arithmetic and extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    Decade,
    Century,
}

impl DateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateUnit::Millisecond => "millisecond",
            DateUnit::Second => "second",
            DateUnit::Minute => "minute",
            DateUnit::Hour => "hour",
            DateUnit::Day => "day",
            DateUnit::Week => "week",
            DateUnit::Month => "month",
            DateUnit::Quarter => "quarter",
            DateUnit::Year => "year",
            DateUnit::Decade => "decade",
            DateUnit::Century => "century",
        }
    }

    /// `INTERVAL '<n> <unit>'`. Postgres has no quarter interval, so quarters become months.
    /// The month count saturates at the i64 bounds; Postgres rejects anything that large.
    fn interval(&self, amount: i64) -> Expr {
        let text = match self {
            DateUnit::Quarter => format!("{} month", amount.saturating_mul(3)),
            unit => format!("{} {}", amount, unit.as_str()),
        };
        Expr::Raw(format!("INTERVAL '{}'", text))
    }
}

impl FromStr for DateUnit {
    type Err = CritError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "millisecond" => DateUnit::Millisecond,
            "second" | "sec" => DateUnit::Second,
            "minute" | "min" => DateUnit::Minute,
            "hour" => DateUnit::Hour,
            "day" => DateUnit::Day,
            "week" => DateUnit::Week,
            "month" => DateUnit::Month,
            "quarter" => DateUnit::Quarter,
            "year" => DateUnit::Year,
            "decade" => DateUnit::Decade,
            "century" | "centurie" => DateUnit::Century,
            _ => return Err(CritError::UnknownDateUnit(s.to_string())),
        };
        Ok(unit)
    }
}

/// Target types for `convert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionType {
    Text,
    Integer,
    Bigint,
    Numeric,
    Float,
    Real,
    Boolean,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Json,
    Jsonb,
    Uuid,
}

impl ConversionType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ConversionType::Text => "text",
            ConversionType::Integer => "integer",
            ConversionType::Bigint => "bigint",
            ConversionType::Numeric => "numeric",
            ConversionType::Float => "float8",
            ConversionType::Real => "real",
            ConversionType::Boolean => "boolean",
            ConversionType::Date => "date",
            ConversionType::Time => "time",
            ConversionType::Timestamp => "timestamp",
            ConversionType::Timestamptz => "timestamptz",
            ConversionType::Json => "json",
            ConversionType::Jsonb => "jsonb",
            ConversionType::Uuid => "uuid",
        }
    }
}

impl FromStr for ConversionType {
    type Err = CritError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" | "varchar" => ConversionType::Text,
            "integer" | "int" | "int4" => ConversionType::Integer,
            "bigint" | "int8" => ConversionType::Bigint,
            "numeric" | "decimal" => ConversionType::Numeric,
            "float" | "float8" | "double" | "double precision" => ConversionType::Float,
            "real" | "float4" => ConversionType::Real,
            "boolean" | "bool" => ConversionType::Boolean,
            "date" => ConversionType::Date,
            "time" => ConversionType::Time,
            "timestamp" => ConversionType::Timestamp,
            "timestamptz" => ConversionType::Timestamptz,
            "json" => ConversionType::Json,
            "jsonb" => ConversionType::Jsonb,
            "uuid" => ConversionType::Uuid,
            _ => return Err(CritError::UnknownConversionType(s.to_string())),
        };
        Ok(ty)
    }
}

/// A wrapped expression exposing scalar SQL functions.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFn {
    node: Expr,
}

impl ScalarFn {
    pub fn wrap(node: Expr) -> Self {
        Self { node }
    }

    pub fn column(name: &str) -> Self {
        Self::wrap(col(name))
    }

    /// The wrapped node.
    pub fn node(&self) -> &Expr {
        &self.node
    }

    pub fn into_node(self) -> Expr {
        self.node
    }

    /// Finish with an alias (AS name).
    pub fn alias(self, name: &str) -> Expr {
        self.node.with_alias(name)
    }

    fn call(self, name: &str, extra: Vec<Expr>) -> Self {
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(self.node);
        args.extend(extra);
        Self::wrap(Expr::func(name, args))
    }

    fn special(name: &str, args: Vec<(Option<&str>, Expr)>) -> Self {
        Self::wrap(Expr::Special {
            name: name.to_string(),
            args: args
                .into_iter()
                .map(|(kw, e)| (kw.map(str::to_string), e))
                .collect(),
        })
    }

    fn json(self, path: JsonPath) -> Expr {
        Expr::JsonAccess {
            base: Box::new(self.node),
            path,
            as_text: false,
        }
    }

    // ==================== String ====================

    pub fn upper(self) -> Self {
        self.call("UPPER", vec![])
    }

    pub fn lower(self) -> Self {
        self.call("LOWER", vec![])
    }

    pub fn initcap(self) -> Self {
        self.call("INITCAP", vec![])
    }

    /// CONCAT(self, parts...)
    pub fn concat(self, parts: impl IntoIterator<Item = Expr>) -> Self {
        self.call("CONCAT", parts.into_iter().collect())
    }

    /// SUBSTRING(self FROM start [FOR len])
    pub fn substring(self, start: i64, len: Option<i64>) -> Self {
        let mut args = vec![(None, self.node), (Some("FROM"), int_arg(start))];
        if let Some(len) = len {
            args.push((Some("FOR"), int_arg(len)));
        }
        Self::special("SUBSTRING", args)
    }

    pub fn left(self, n: i64) -> Self {
        self.call("LEFT", vec![int_arg(n)])
    }

    pub fn right(self, n: i64) -> Self {
        self.call("RIGHT", vec![int_arg(n)])
    }

    pub fn trim(self) -> Self {
        self.call("TRIM", vec![])
    }

    pub fn ltrim(self) -> Self {
        self.call("LTRIM", vec![])
    }

    pub fn rtrim(self) -> Self {
        self.call("RTRIM", vec![])
    }

    pub fn replace(self, from: &str, to: &str) -> Self {
        self.call("REPLACE", vec![lit(from), lit(to)])
    }

    pub fn reverse(self) -> Self {
        self.call("REVERSE", vec![])
    }

    pub fn repeat(self, n: i64) -> Self {
        self.call("REPEAT", vec![int_arg(n)])
    }

    pub fn length(self) -> Self {
        self.call("LENGTH", vec![])
    }

    /// POSITION(needle IN self), 1-based, 0 when absent.
    pub fn position(self, needle: &str) -> Self {
        Self::special("POSITION", vec![(None, lit(needle)), (Some("IN"), self.node)])
    }

    // ==================== Numeric ====================

    pub fn abs(self) -> Self {
        self.call("ABS", vec![])
    }

    /// ROUND(self) or ROUND(self::numeric, digits); Postgres only rounds to digits on numeric.
    pub fn round(self, digits: Option<i64>) -> Self {
        match digits {
            Some(d) => Self::wrap(Expr::func("ROUND", vec![self.node.cast("numeric"), int_arg(d)])),
            None => self.call("ROUND", vec![]),
        }
    }

    pub fn floor(self) -> Self {
        self.call("FLOOR", vec![])
    }

    pub fn ceil(self) -> Self {
        self.call("CEIL", vec![])
    }

    /// TRUNC(self) or TRUNC(self::numeric, digits)
    pub fn trunc(self, digits: Option<i64>) -> Self {
        match digits {
            Some(d) => Self::wrap(Expr::func("TRUNC", vec![self.node.cast("numeric"), int_arg(d)])),
            None => self.call("TRUNC", vec![]),
        }
    }

    /// MOD(self, n)
    pub fn modulo(self, n: impl Into<Value>) -> Self {
        self.call("MOD", vec![lit(n)])
    }

    pub fn power(self, exponent: impl Into<Value>) -> Self {
        self.call("POWER", vec![lit(exponent)])
    }

    pub fn sqrt(self) -> Self {
        self.call("SQRT", vec![])
    }

    pub fn sign(self) -> Self {
        self.call("SIGN", vec![])
    }

    // ==================== Trigonometric ====================

    pub fn sin(self) -> Self {
        self.call("SIN", vec![])
    }

    pub fn cos(self) -> Self {
        self.call("COS", vec![])
    }

    pub fn tan(self) -> Self {
        self.call("TAN", vec![])
    }

    pub fn asin(self) -> Self {
        self.call("ASIN", vec![])
    }

    pub fn acos(self) -> Self {
        self.call("ACOS", vec![])
    }

    pub fn atan(self) -> Self {
        self.call("ATAN", vec![])
    }

    // ==================== Date / time ====================

    pub fn current_timestamp() -> Self {
        Self::wrap(Expr::Raw("CURRENT_TIMESTAMP".to_string()))
    }

    pub fn current_date() -> Self {
        Self::wrap(Expr::Raw("CURRENT_DATE".to_string()))
    }

    pub fn current_time() -> Self {
        Self::wrap(Expr::Raw("CURRENT_TIME".to_string()))
    }

    /// DATE_PART('unit', self)
    pub fn date_part(self, unit: DateUnit) -> Self {
        Self::wrap(Expr::func(
            "DATE_PART",
            vec![Expr::Raw(format!("'{}'", unit.as_str())), self.node],
        ))
    }

    fn extract(self, field: &str) -> Self {
        Self::special("EXTRACT", vec![(None, Expr::Raw(field.to_string())), (Some("FROM"), self.node)])
    }

    pub fn year(self) -> Self {
        self.extract("YEAR")
    }

    pub fn month(self) -> Self {
        self.extract("MONTH")
    }

    pub fn day(self) -> Self {
        self.extract("DAY")
    }

    /// TO_CHAR(self, format)
    pub fn date_format(self, format: &str) -> Self {
        self.call("TO_CHAR", vec![lit(format)])
    }

    /// self + INTERVAL 'n unit'
    pub fn date_add(self, amount: i64, unit: DateUnit) -> Self {
        Self::wrap(Expr::Binary {
            left: Box::new(self.node),
            op: BinaryOp::Add,
            right: Box::new(unit.interval(amount)),
        })
    }

    /// self - INTERVAL 'n unit'
    pub fn date_sub(self, amount: i64, unit: DateUnit) -> Self {
        Self::wrap(Expr::Binary {
            left: Box::new(self.node),
            op: BinaryOp::Sub,
            right: Box::new(unit.interval(amount)),
        })
    }

    /// AGE(self), or AGE(at, self): the age of `self` measured at `at`.
    pub fn age(self, at: Option<Expr>) -> Self {
        match at {
            Some(at) => Self::wrap(Expr::func("AGE", vec![at, self.node])),
            None => self.call("AGE", vec![]),
        }
    }

    // ==================== Conditional ====================

    /// COALESCE(self, fallbacks...)
    pub fn coalesce(self, fallbacks: impl IntoIterator<Item = Expr>) -> Self {
        self.call("COALESCE", fallbacks.into_iter().collect())
    }

    pub fn nullif(self, value: impl Into<Value>) -> Self {
        self.call("NULLIF", vec![lit(value)])
    }

    pub fn greatest(self, others: impl IntoIterator<Item = Expr>) -> Self {
        self.call("GREATEST", others.into_iter().collect())
    }

    /// LEAST(self, others...)
    pub fn smallest(self, others: impl IntoIterator<Item = Expr>) -> Self {
        self.call("LEAST", others.into_iter().collect())
    }

    // ==================== Conversion ====================

    pub fn convert(self, target: ConversionType) -> Self {
        Self::wrap(self.node.cast(target.sql_name()))
    }

    /// TO_NUMBER(self, format), or a plain numeric cast without a format.
    pub fn to_number(self, format: Option<&str>) -> Self {
        match format {
            Some(fmt) => self.call("TO_NUMBER", vec![lit(fmt)]),
            None => Self::wrap(self.node.cast("numeric")),
        }
    }

    // ==================== JSON ====================

    /// self->path
    pub fn json_get<F>(self, path: F) -> Self
    where
        F: FnOnce(JsonPath) -> JsonPath,
    {
        Self::wrap(self.json(JsonPath::navigate(path)))
    }

    /// JSONB_ARRAY_LENGTH(self->path)
    pub fn json_array_length<F>(self, path: F) -> Self
    where
        F: FnOnce(JsonPath) -> JsonPath,
    {
        let target = self.json(JsonPath::navigate(path));
        Self::wrap(Expr::func("JSONB_ARRAY_LENGTH", vec![target]))
    }

    /// JSONB_TYPEOF(self->path)
    pub fn json_typeof<F>(self, path: F) -> Self
    where
        F: FnOnce(JsonPath) -> JsonPath,
    {
        let target = self.json(JsonPath::navigate(path));
        Self::wrap(Expr::func("JSONB_TYPEOF", vec![target]))
    }
}

/// Inlined rather than bound: these functions only have `integer` overloads,
/// and a bound `i64` arrives as `bigint`.
fn int_arg(n: i64) -> Expr {
    Expr::Raw(n.to_string())
}

impl From<ScalarFn> for Expr {
    fn from(f: ScalarFn) -> Self {
        f.into_node()
    }
}

//! Table schemas and column arguments.

use serde::{Deserialize, Serialize};

use super::json_path::JsonPath;
use crate::error::{CritError, CritResult};

/// Postgres column types the compiler distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Smallint,
    Integer,
    Bigint,
    Numeric,
    Real,
    Double,
    Text,
    Boolean,
    Date,
    Timestamp,
    Timestamptz,
    Interval,
    Uuid,
    Json,
    Jsonb,
}

impl ColumnType {
    pub fn is_json(&self) -> bool {
        matches!(self, ColumnType::Json | ColumnType::Jsonb)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Smallint
                | ColumnType::Integer
                | ColumnType::Bigint
                | ColumnType::Numeric
                | ColumnType::Real
                | ColumnType::Double
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::Timestamp | ColumnType::Timestamptz | ColumnType::Interval
        )
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Smallint => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::Bigint => "bigint",
            ColumnType::Numeric => "numeric",
            ColumnType::Real => "real",
            ColumnType::Double => "double precision",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Timestamptz => "timestamptz",
            ColumnType::Interval => "interval",
            ColumnType::Uuid => "uuid",
            ColumnType::Json => "json",
            ColumnType::Jsonb => "jsonb",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

/// The table a compilation targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    /// Declare a column.
    pub fn column(mut self, name: &str, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn find(&self, column: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Look up a column or fail naming the table.
    pub fn require(&self, column: &str) -> CritResult<&ColumnDef> {
        self.find(column)
            .ok_or_else(|| CritError::unknown_column(&self.name, column))
    }
}

/// A column reference as passed to aggregates and window clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnArg {
    Plain(String),
    Json { column: String, path: JsonPath },
}

impl ColumnArg {
    /// `column` navigated with a path closure.
    pub fn json<F>(column: &str, f: F) -> Self
    where
        F: FnOnce(JsonPath) -> JsonPath,
    {
        ColumnArg::Json {
            column: column.to_string(),
            path: JsonPath::navigate(f),
        }
    }

    /// `column` navigated with a textual path such as `skills[0]`.
    pub fn json_str(column: &str, path: &str) -> CritResult<Self> {
        Ok(ColumnArg::Json {
            column: column.to_string(),
            path: JsonPath::parse(path)?,
        })
    }

    pub fn column(&self) -> &str {
        match self {
            ColumnArg::Plain(c) => c,
            ColumnArg::Json { column, .. } => column,
        }
    }
}

impl From<&str> for ColumnArg {
    fn from(s: &str) -> Self {
        ColumnArg::Plain(s.to_string())
    }
}

impl From<String> for ColumnArg {
    fn from(s: String) -> Self {
        ColumnArg::Plain(s)
    }
}

impl From<&String> for ColumnArg {
    fn from(s: &String) -> Self {
        ColumnArg::Plain(s.clone())
    }
}

//! Error types for critql.

use thiserror::Error;

/// The main error type for critql operations.
///
/// Every compile-time variant names the function, column or clause that
/// rejected its input. None of them are transient.
#[derive(Debug, Error)]
pub enum CritError {
    /// Column is not declared on the table schema.
    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// JSON-typed column passed to an aggregate without a path.
    #[error("{function}: column '{column}' is JSON-typed and requires a path")]
    JsonPathRequired {
        function: &'static str,
        column: String,
    },

    /// JSON path given for a column that is not JSON-typed.
    #[error("{function}: column '{column}' is not JSON-typed, a path is not allowed")]
    UnexpectedJsonPath {
        function: &'static str,
        column: String,
    },

    /// Column type cannot be fed to the function.
    #[error("{function}: column '{column}' of type {column_type} is not supported")]
    UnsupportedColumnType {
        function: &'static str,
        column: String,
        column_type: String,
    },

    /// Unknown date unit name.
    #[error("Unknown date unit: '{0}'")]
    UnknownDateUnit(String),

    /// Unknown conversion type name.
    #[error("Unknown conversion type: '{0}'")]
    UnknownConversionType(String),

    /// Invalid comparison operator.
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    /// Criteria map entry has an unusable shape.
    #[error("Invalid criterion for column '{column}': {message}")]
    InvalidCriterion { column: String, message: String },

    /// Percentile fraction outside of [0, 1] or empty fraction list.
    #[error("{function}: invalid fraction {message}")]
    InvalidFraction {
        function: &'static str,
        message: String,
    },

    /// Boundary kind `preceding`/`following` given without an offset.
    #[error("Required number boundary type: '{0}' needs an offset")]
    MissingBoundaryOffset(String),

    /// Boundary kind that takes no offset was given one.
    #[error("Boundary type '{kind}' does not take an offset (got {offset})")]
    UnexpectedBoundaryOffset { kind: String, offset: i64 },

    /// Unknown boundary kind.
    #[error("Invalid boundary type: '{0}'")]
    InvalidBoundaryType(String),

    /// Frame bounds that cannot form a frame.
    #[error("Invalid window frame: {0}")]
    InvalidFrame(String),

    /// Window clause given no columns.
    #[error("{0} requires at least one column")]
    EmptyClause(&'static str),

    /// Unknown EXCLUDE option.
    #[error("Invalid exclude option: '{0}'. Expected: current row, group, ties")]
    InvalidExcludeOption(String),

    /// Failed to parse a JSON path descriptor.
    #[error("Invalid JSON path at position {position}: {message}")]
    JsonPath { position: usize, message: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CritError {
    /// Create an unknown column error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create an invalid criterion error.
    pub fn criterion(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCriterion {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a JSON path parse error at the given position.
    pub fn json_path(position: usize, message: impl Into<String>) -> Self {
        Self::JsonPath {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for critql operations.
pub type CritResult<T> = Result<T, CritError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CritError::MissingBoundaryOffset("preceding".to_string());
        assert_eq!(
            err.to_string(),
            "Required number boundary type: 'preceding' needs an offset"
        );
    }

    #[test]
    fn test_error_names_function_and_column() {
        let err = CritError::JsonPathRequired {
            function: "sum",
            column: "profile".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "sum: column 'profile' is JSON-typed and requires a path"
        );
    }
}

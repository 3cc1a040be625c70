//! Connection configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::ast::TableSchema;
use crate::error::{CritError, CritResult};

/// Environment variable overriding `database_url`.
pub const DATABASE_URL_ENV: &str = "CRITQL_DATABASE_URL";

/// Connection and schema configuration.
///
/// ```toml
/// database_url = "postgres://localhost/app"
/// max_connections = 5
///
/// [[tables]]
/// name = "employees"
/// columns = [
///     { name = "salary", type = "numeric" },
///     { name = "profile", type = "jsonb" },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Log every executed statement at INFO instead of DEBUG
    #[serde(default)]
    pub statement_log: bool,

    /// Table schemas used to resolve aggregate columns
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
            statement_log: false,
            tables: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `<config dir>/critql/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("critql").join("config.toml"))
    }

    /// Load from the default path (if present), then apply the environment override.
    pub fn load() -> CritResult<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_env())
    }

    pub fn from_path(path: &Path) -> CritResult<Self> {
        debug!(path = %path.display(), "loading config");
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CritResult<Self> {
        toml::from_str(content).map_err(|e| CritError::Config(e.to_string()))
    }

    /// Apply `CRITQL_DATABASE_URL` when it is set.
    pub fn with_env(self) -> Self {
        self.with_database_url_from(std::env::var(DATABASE_URL_ENV).ok())
    }

    fn with_database_url_from(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.database_url = Some(url);
        }
        self
    }

    pub fn database_url(&self) -> CritResult<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CritError::Config(format!(
                "no database_url configured (set it in config.toml or {})",
                DATABASE_URL_ENV
            ))
        })
    }

    /// Find a declared table schema by name.
    pub fn table(&self, name: &str) -> CritResult<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CritError::Config(format!("table '{}' is not declared", name)))
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn statement_log(mut self, enabled: bool) -> Self {
        self.config.statement_log = enabled;
        self
    }

    pub fn table(mut self, schema: TableSchema) -> Self {
        self.config.tables.push(schema);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ColumnType;

    #[test]
    fn test_from_toml_with_tables() {
        let config = Config::from_toml_str(
            r#"
            database_url = "postgres://localhost/hr"

            [[tables]]
            name = "employees"
            columns = [
                { name = "salary", type = "numeric" },
                { name = "profile", type = "jsonb" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/hr");
        assert_eq!(config.max_connections, 5);
        let employees = config.table("employees").unwrap();
        assert_eq!(employees.require("profile").unwrap().ty, ColumnType::Jsonb);
        assert!(config.table("payroll").is_err());
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let config = Config::default();
        assert!(matches!(config.database_url(), Err(CritError::Config(_))));
    }

    #[test]
    fn test_override_replaces_file_value() {
        let config = Config::builder()
            .database("postgres://file/db")
            .build()
            .with_database_url_from(Some("postgres://env/db".to_string()));
        assert_eq!(config.database_url().unwrap(), "postgres://env/db");

        let unchanged = Config::builder()
            .database("postgres://file/db")
            .build()
            .with_database_url_from(Some(String::new()));
        assert_eq!(unchanged.database_url().unwrap(), "postgres://file/db");
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml_str("max_connections = \"many\""),
            Err(CritError::Config(_))
        ));
    }
}

//! Supported SQL dialects.

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    BigQueryDialect, Dialect, GenericDialect, PostgreSqlDialect, SnowflakeDialect,
};

use crate::error::ExtractError;

/// SQL dialects the extractor understands.
///
/// Dialect selection affects quoting/identifier rules and the set of
/// COALESCE-equivalent function names; it does not change the shape of the
/// extraction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[serde(alias = "ansi")]
    #[default]
    Generic,
    #[serde(alias = "postgresql")]
    Postgres,
    BigQuery,
    Snowflake,
}

impl SqlDialect {
    /// Returns the wire representation of this dialect.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Generic => "generic",
            SqlDialect::Postgres => "postgres",
            SqlDialect::BigQuery => "bigquery",
            SqlDialect::Snowflake => "snowflake",
        }
    }

    /// The sqlparser dialect used to tokenize and parse statements.
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::BigQuery => Box::new(BigQueryDialect {}),
            SqlDialect::Snowflake => Box::new(SnowflakeDialect {}),
        }
    }

    /// COALESCE-equivalent functions for this dialect, uppercase.
    pub fn coalesce_functions(&self) -> &'static [&'static str] {
        match self {
            SqlDialect::Generic | SqlDialect::Postgres => &["COALESCE"],
            SqlDialect::BigQuery => &["COALESCE", "IFNULL"],
            SqlDialect::Snowflake => &["COALESCE", "IFNULL", "NVL", "NVL2"],
        }
    }

    /// True when `name` (case-insensitive) is a COALESCE-family function
    /// under this dialect.
    pub fn is_coalesce_function(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.coalesce_functions().contains(&upper.as_str())
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = ExtractError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" | "ansi" => Ok(SqlDialect::Generic),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "bigquery" => Ok(SqlDialect::BigQuery),
            "snowflake" => Ok(SqlDialect::Snowflake),
            _ => Err(ExtractError::UnknownDialect(s.to_string())),
        }
    }
}

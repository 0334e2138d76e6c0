//! Error types for the sync library.

use thiserror::Error;

/// Main error type for sync and verification operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source (MySQL) connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target (YashanDB) ODBC error
    #[error("Target database error: {0}")]
    Target(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Source catalog lookup failed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Target catalog has no columns for the table
    #[error("target table not found: {schema}.{table}")]
    TargetTableNotFound { schema: String, table: String },

    /// Source and target column lists cannot be paired positionally
    #[error("Column count mismatch for table {table}: source has {source_count}, target has {target_count}")]
    ColumnMismatch {
        table: String,
        source_count: usize,
        target_count: usize,
    },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Source column type has no YashanDB counterpart
    #[error("Unsupported source type: {0}")]
    UnsupportedType(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl From<odbc_api::Error> for MigrateError {
    fn from(e: odbc_api::Error) -> Self {
        MigrateError::Target(e.to_string())
    }
}

impl From<tokio::task::JoinError> for MigrateError {
    fn from(e: tokio::task::JoinError) -> Self {
        MigrateError::Task(e.to_string())
    }
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Target error with the statement that failed
    pub fn target(message: impl std::fmt::Display, sql: &str) -> Self {
        MigrateError::Target(format!("{} - SQL: {}", message, sql))
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Pool { .. } => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::pool("refused", "opening pool").exit_code(), 3);
        assert_eq!(MigrateError::transfer("t", "boom").exit_code(), 1);
    }

    #[test]
    fn test_target_table_not_found_message() {
        let err = MigrateError::TargetTableNotFound {
            schema: "APP".into(),
            table: "USERS".into(),
        };
        assert_eq!(err.to_string(), "target table not found: APP.USERS");
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::pool("connection refused", "creating MySQL source pool");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Pool error: connection refused"));
        assert!(detailed.contains("creating MySQL source pool"));
    }
}

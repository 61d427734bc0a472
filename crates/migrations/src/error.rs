//! Error types for the migration system
//!
//! Every failure is surfaced to the caller with enough context to name the
//! offending migration and its underlying cause. Nothing is retried.

use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for ledger, backend and engine operations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Backend unreachable or authentication failed
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A unit's forward or backward operation failed
    #[error("Migration '{migration}' failed: {source}")]
    Execution {
        migration: String,
        #[source]
        source: Box<MigrationError>,
    },

    /// A migration with the same name is already defined
    #[error("Migration already exists: {name}")]
    DuplicateDefinition { name: String },

    /// The ledger already holds a record for this migration
    #[error("Migration '{migration}' is already recorded in the ledger")]
    DuplicateRecord { migration: String },

    /// A ledger record references a migration the source cannot provide
    #[error("Ledger references migration '{migration}' which is missing from the source")]
    LedgerCorruption { migration: String },

    /// Non-success response from a stateless backend, with the raw body
    #[error("Backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Operation '{operation}' is not supported by the {dialect} dialect")]
    Unsupported { operation: String, dialect: String },

    #[error("Invalid migration name '{name}': expected <timestamp>_<description>")]
    InvalidName { name: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Wrap an error raised while running the named migration
    pub fn execution(migration: impl Into<String>, source: MigrationError) -> Self {
        Self::Execution {
            migration: migration.into(),
            source: Box::new(source),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            dialect: dialect.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Name of the migration this error is attributed to, if any
    pub fn migration(&self) -> Option<&str> {
        match self {
            Self::Execution { migration, .. }
            | Self::DuplicateRecord { migration }
            | Self::LedgerCorruption { migration } => Some(migration),
            Self::DuplicateDefinition { name } | Self::InvalidName { name } => Some(name),
            _ => None,
        }
    }

    /// Whether the error happened before any backend work could start
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => Self::connection(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // invalid_authorization_specification, invalid_password
                Some("28000") | Some("28P01") => Self::connection(err.to_string()),
                _ => Self::database(err.to_string()),
            },
            _ => Self::database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for MigrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_builder() {
            Self::connection(err.to_string())
        } else {
            Self::query(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::query(format!("Failed to decode response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_names_migration_and_cause() {
        let err = MigrationError::execution(
            "2024_01_02_000000_create_teams",
            MigrationError::Backend {
                status: 500,
                body: "Code: 62. Syntax error".to_string(),
            },
        );

        assert_eq!(err.migration(), Some("2024_01_02_000000_create_teams"));
        let message = err.to_string();
        assert!(message.contains("2024_01_02_000000_create_teams"));
        assert!(message.contains("Code: 62. Syntax error"));
    }

    #[test]
    fn test_connection_classification() {
        let err: MigrationError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_connection());

        let err: MigrationError = sqlx::Error::RowNotFound.into();
        assert!(!err.is_connection());
    }
}
